// ABOUTME: Typed rows returned by the CRM stored procedures
// ABOUTME: Numeric columns are cast to float8/int8 in SQL so every field maps to a plain Rust type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Product found by semantic search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductMatch {
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// List price
    pub precio: Option<f64>,
    /// Presentation / content
    pub contenido: Option<String>,
    /// Conditions the product treats
    pub padecimientos: Option<String>,
}

/// Technical sheet chunk found by semantic search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TechnicalSheetMatch {
    /// Product SKU
    pub sku: String,
    /// Chunk text
    pub content: String,
}

/// Client candidate from fuzzy name search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClientMatch {
    /// Client id
    pub id_cliente: String,
    /// Doctor name
    pub nombre: String,
    /// Similarity in 0..=1
    pub similarity: f64,
}

/// Item in a doctor's kit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// Units available
    pub cantidad_disponible: i64,
    /// Unit price
    pub precio: Option<f64>,
    /// Presentation / content
    pub contenido: Option<String>,
}

/// Kit movement or ODV sale line of a doctor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Movement {
    /// `botiquin` or `odv`
    pub fuente: String,
    /// Movement date
    pub fecha: Option<NaiveDate>,
    /// Movement type (creation, sale, collection...)
    pub tipo: String,
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// Units
    pub cantidad: i64,
    /// Unit price
    pub precio: Option<f64>,
}

/// M1/M2/M3 classification of one product for a doctor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProductClassification {
    /// Product SKU
    pub sku: String,
    /// Classification label
    pub clasificacion: String,
}

/// Recurring (ODV) sale line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OdvSale {
    /// Client the sale belongs to
    pub id_cliente: String,
    /// Sale date
    pub fecha: Option<NaiveDate>,
    /// Doctor name
    pub nombre_cliente: String,
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// Units
    pub cantidad: i64,
    /// Unit price
    pub precio: Option<f64>,
}

/// Product line inside a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Product SKU
    pub sku: String,
    /// Units returned
    #[serde(default)]
    pub cantidad: i64,
}

/// Collection (return) event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Collection {
    /// Client the collection belongs to
    pub id_cliente: String,
    /// When the collection was registered
    pub created_at: DateTime<Utc>,
    /// Doctor name
    pub nombre_cliente: String,
    /// Workflow state
    pub estado: String,
    /// Notes from the distribution center
    pub cedis_observaciones: Option<String>,
    /// Returned items
    #[sqlx(json)]
    pub items: Vec<CollectionItem>,
}

impl Collection {
    /// Total units across all items
    #[must_use]
    pub fn pieces(&self) -> i64 {
        self.items.iter().map(|item| item.cantidad).sum()
    }
}

/// Revenue and units split by M1 (kit), M2 (conversion) and M3 (exposure)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SalesMetrics {
    /// Kit units (M1)
    pub piezas_botiquin: i64,
    /// Kit revenue (M1)
    pub ventas_botiquin: f64,
    /// Conversion units (M2)
    pub piezas_conversion: i64,
    /// Conversion revenue (M2)
    pub ventas_conversion: f64,
    /// Exposure units (M3)
    pub piezas_exposicion: i64,
    /// Exposure revenue (M3)
    pub ventas_exposicion: f64,
    /// Total units
    pub piezas_totales: i64,
    /// Total revenue
    pub ventas_totales: f64,
}

/// Product revenue ranking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductSales {
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// Breakdown
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub metrics: SalesMetrics,
}

/// Brand revenue row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BrandSales {
    /// Brand
    pub marca: String,
    /// Breakdown
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub metrics: SalesMetrics,
}

/// Billing composition of one doctor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DoctorBilling {
    /// Client id
    pub id_cliente: String,
    /// Doctor name
    pub nombre_cliente: String,
    /// Tier (Diamante, Oro, Plata, Bronce)
    pub rango_actual: Option<String>,
    /// Current billing
    pub facturacion_actual: Option<f64>,
    /// Billing before the kit
    pub baseline: Option<f64>,
    /// M1 revenue
    pub current_m1: Option<f64>,
    /// M2 revenue
    pub current_m2: Option<f64>,
    /// M3 revenue
    pub current_m3: Option<f64>,
    /// Growth over baseline, percent
    pub pct_crecimiento: Option<f64>,
}

/// Revenue attributed to a medical condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ConditionPerformance {
    /// Condition name
    pub padecimiento: String,
    /// Revenue
    pub valor: f64,
    /// Units sold
    pub piezas: i64,
}

/// Kit impact summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct KitImpact {
    /// M1 to ODV adoptions
    pub adopciones: i64,
    /// Adoption revenue
    pub revenue_adopciones: f64,
    /// M2 conversions
    pub conversiones: i64,
    /// Conversion revenue
    pub revenue_conversiones: f64,
    /// M3 exposures
    pub exposiciones: i64,
    /// Exposure revenue
    pub revenue_exposiciones: f64,
    /// Cross-sell pairs
    pub crosssell_pares: i64,
    /// Cross-sell revenue
    pub revenue_crosssell: f64,
    /// Revenue attributable to the kit
    pub revenue_total_impacto: f64,
    /// Total ODV revenue
    pub revenue_total_odv: f64,
    /// Share of ODV revenue attributable to the kit, percent
    pub porcentaje_impacto: f64,
}

/// Price list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductPrice {
    /// Product SKU
    pub sku: String,
    /// Product description
    pub descripcion: String,
    /// Brand
    pub marca: Option<String>,
    /// Current price
    pub precio: Option<f64>,
    /// Presentation / content
    pub contenido: Option<String>,
    /// When the price last changed
    pub ultima_actualizacion: Option<DateTime<Utc>>,
}

/// Row of a reporting procedure whose column set belongs to the report
///
/// These reports are handed to the model as JSON, so the row is kept as an
/// JSON object instead of a fixed struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportRow(pub Map<String, Value>);

impl ReportRow {
    /// The `id_cliente` column, if present
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        match self.0.get("id_cliente")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    /// Compact single-line JSON
    #[must_use]
    pub fn to_json_line(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Indented JSON
    #[must_use]
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.to_json_line())
    }
}

impl From<Map<String, Value>> for ReportRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_collection_pieces_sums_items() {
        let collection = Collection {
            id_cliente: "C1".to_owned(),
            created_at: Utc::now(),
            nombre_cliente: "Dra. Ruiz".to_owned(),
            estado: "COMPLETADA".to_owned(),
            cedis_observaciones: None,
            items: vec![
                CollectionItem {
                    sku: "A".to_owned(),
                    cantidad: 3,
                },
                CollectionItem {
                    sku: "B".to_owned(),
                    cantidad: 2,
                },
            ],
        };
        assert_eq!(collection.pieces(), 5);
    }

    #[test]
    fn test_report_row_client_id_accepts_numbers() {
        let row: ReportRow = serde_json::from_value(json!({"id_cliente": 42, "ventas": 10}))
            .unwrap();
        assert_eq!(row.client_id().as_deref(), Some("42"));
        assert_eq!(row.to_json_line(), r#"{"id_cliente":42,"ventas":10}"#);
    }
}
