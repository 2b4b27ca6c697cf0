use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");

    let mut keys = vec![(
        mock_server::DEMO_API_KEY.to_string(),
        mock_server::DEMO_SHARED_SECRET.to_string(),
    )];
    if let (Ok(key), Ok(secret)) = (std::env::var("DOL_KEY"), std::env::var("DOL_SECRET")) {
        keys.push((key, secret));
    }

    let listener = TcpListener::bind(&addr).await?;
    mock_server::run(listener, mock_server::app_with_keys(keys)).await
}
