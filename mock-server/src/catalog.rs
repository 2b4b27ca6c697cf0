//! Sample datasets served by the mock statistics API.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

pub type Row = Map<String, Value>;

pub const SAMPLE_DATASET: &str = "statistics/BLS_Numbers";

/// Column names and EDM types shared by every sample table.
pub const COLUMNS: [(&str, &str); 4] = [
    ("year", "Edm.Int32"),
    ("period", "Edm.String"),
    ("type", "Edm.String"),
    ("value", "Edm.Double"),
];

#[derive(Debug, Default)]
pub struct Catalog {
    datasets: BTreeMap<String, Dataset>,
}

#[derive(Debug, Default)]
pub struct Dataset {
    tables: BTreeMap<String, Vec<Row>>,
}

impl Catalog {
    /// `statistics/BLS_Numbers` with two monthly series, 2010 through 2014,
    /// each month reported as final (`F`) and preliminary (`P`).
    pub fn sample() -> Self {
        let mut dataset = Dataset::default();
        dataset.insert("averageHourlyEarnings12MonthChange", series(2.0, 0.1));
        dataset.insert("consumerPriceIndex12MonthChange", series(1.2, 0.2));

        let mut catalog = Catalog::default();
        catalog.insert(SAMPLE_DATASET, dataset);
        catalog
    }

    pub fn insert(&mut self, name: &str, dataset: Dataset) {
        self.datasets.insert(name.to_string(), dataset);
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.get(name)
    }
}

impl Dataset {
    pub fn insert(&mut self, table: &str, rows: Vec<Row>) {
        self.tables.insert(table.to_string(), rows);
    }

    pub fn table(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn series(base: f64, step: f64) -> Vec<Row> {
    let mut rows = Vec::new();
    for year in 2010..=2014 {
        for month in 1..=12 {
            for (offset, kind) in [(0.0, "F"), (0.05, "P")] {
                let n = ((year - 2010) * 12 + month) % 9;
                let value = ((base + step * f64::from(n) + offset) * 100.0).round() / 100.0;
                let row = json!({
                    "year": year,
                    "period": format!("M{month:02}"),
                    "type": kind,
                    "value": value,
                });
                if let Value::Object(row) = row {
                    rows.push(row);
                }
            }
        }
    }
    rows
}

/// EDMX `$metadata` document describing every table in `dataset`.
pub fn metadata_document(name: &str, dataset: &Dataset) -> String {
    let namespace = name.replace('/', ".");
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">"#,
    );
    xml.push_str(r#"<edmx:DataServices m:DataServiceVersion="1.0" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">"#);
    xml.push_str(&format!(
        r#"<Schema Namespace="{namespace}" xmlns="http://schemas.microsoft.com/ado/2008/09/edm">"#
    ));
    for table in dataset.table_names() {
        xml.push_str(&format!(r#"<EntityType Name="{table}"><Key><PropertyRef Name="year"/></Key>"#));
        for (column, edm_type) in COLUMNS {
            xml.push_str(&format!(r#"<Property Name="{column}" Type="{edm_type}"/>"#));
        }
        xml.push_str("</EntityType>");
    }
    xml.push_str(r#"<EntityContainer Name="Entities" m:IsDefaultEntityContainer="true">"#);
    for table in dataset.table_names() {
        xml.push_str(&format!(
            r#"<EntitySet Name="{table}" EntityType="{namespace}.{table}"/>"#
        ));
    }
    xml.push_str("</EntityContainer></Schema></edmx:DataServices></edmx:Edmx>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_tables_have_every_month_twice() {
        let catalog = Catalog::sample();
        let dataset = catalog.dataset(SAMPLE_DATASET).unwrap();
        let rows = dataset.table("consumerPriceIndex12MonthChange").unwrap();
        assert_eq!(rows.len(), 5 * 12 * 2);
        let final_2013 = rows
            .iter()
            .filter(|r| r["type"] == "F" && r["year"] == 2013)
            .count();
        assert_eq!(final_2013, 12);
    }

    #[test]
    fn unknown_names_are_absent() {
        let catalog = Catalog::sample();
        assert!(catalog.dataset("blah").is_none());
        assert!(catalog.dataset(SAMPLE_DATASET).unwrap().table("blahblah").is_none());
    }

    #[test]
    fn metadata_lists_each_table() {
        let catalog = Catalog::sample();
        let doc = metadata_document(SAMPLE_DATASET, catalog.dataset(SAMPLE_DATASET).unwrap());
        assert!(doc.contains(r#"<EntityType Name="averageHourlyEarnings12MonthChange">"#));
        assert!(doc.contains(r#"EntityType="statistics.BLS_Numbers.consumerPriceIndex12MonthChange""#));
    }
}
