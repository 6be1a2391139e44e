// ABOUTME: Product catalog tools: semantic product search, technical sheets and price lookup
// ABOUTME: Semantic tools embed the query text before calling the vector match procedures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Catalog Tools
//!
//! - `search_medicamentos` - products by similarity to a condition or symptom
//! - `search_fichas_tecnicas` - technical sheet chunks (composition, indications)
//! - `get_precios_medicamentos` - prices by name, SKU or description

use async_trait::async_trait;
use serde_json::Value;
use syntia_core::constants::embeddings::{
    PRODUCT_MATCH_COUNT, PRODUCT_MATCH_THRESHOLD, SHEET_MATCH_COUNT, SHEET_MATCH_THRESHOLD,
};
use syntia_core::constants::tools::{
    GET_PRECIOS_MEDICAMENTOS, SEARCH_FICHAS_TECNICAS, SEARCH_MEDICAMENTOS,
};
use syntia_core::errors::AppResult;

use super::{money, or_na};
use crate::database::crm::{ProductMatch, ProductPrice, TechnicalSheetMatch};
use crate::llm::EmbeddingTask;
use crate::tools::args::{optional_str, required_str};
use crate::tools::context::ToolExecutionContext;
use crate::tools::schema::{JsonSchema, PropertySchema};
use crate::tools::traits::{ChatTool, ToolCapabilities};

fn format_product(product: &ProductMatch) -> String {
    format!(
        "{}: {} ({}) ${} | {} | Padecimientos: {}",
        product.sku,
        product.descripcion,
        or_na(product.marca.as_deref()),
        money(product.precio),
        product.contenido.as_deref().unwrap_or_default(),
        or_na(product.padecimientos.as_deref()),
    )
}

fn format_sheet(sheet: &TechnicalSheetMatch) -> String {
    format!("[{}]:\n{}", sheet.sku, sheet.content)
}

fn format_price(price: &ProductPrice) -> String {
    let updated = price
        .ultima_actualizacion
        .map_or_else(|| "N/A".to_owned(), |at| at.format("%Y-%m-%d").to_string());
    format!(
        "{}: {} ({}) | ${} | {} | Actualizado: {}",
        price.sku,
        price.descripcion,
        or_na(price.marca.as_deref()),
        money(price.precio),
        price.contenido.as_deref().unwrap_or_default(),
        updated,
    )
}

// ============================================================================
// SearchMedicamentosTool
// ============================================================================

/// Semantic product search
pub struct SearchMedicamentosTool;

#[async_trait]
impl ChatTool for SearchMedicamentosTool {
    fn name(&self) -> &'static str {
        SEARCH_MEDICAMENTOS
    }

    fn description(&self) -> &'static str {
        "Busca medicamentos por similitud semantica. Usa cuando pregunten por productos para un padecimiento, condicion medica, o tipo de tratamiento."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![(
                "query",
                PropertySchema::string(
                    "Texto de busqueda: padecimiento, sintoma, tipo de producto, o nombre de medicamento",
                ),
            )],
            &["query"],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::SEMANTIC_SEARCH | ToolCapabilities::CATALOG
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let query = required_str(args, "query")?;
        let embedding = context.embedder.embed(query, EmbeddingTask::Query).await?;
        let products = context
            .crm
            .match_products(&embedding, PRODUCT_MATCH_THRESHOLD, PRODUCT_MATCH_COUNT)
            .await?;

        if products.is_empty() {
            return Ok("No se encontraron medicamentos relevantes.".to_owned());
        }
        Ok(products
            .iter()
            .map(format_product)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// SearchFichasTecnicasTool
// ============================================================================

/// Semantic technical sheet search
pub struct SearchFichasTecnicasTool;

#[async_trait]
impl ChatTool for SearchFichasTecnicasTool {
    fn name(&self) -> &'static str {
        SEARCH_FICHAS_TECNICAS
    }

    fn description(&self) -> &'static str {
        "Busca informacion tecnica de productos (composicion, indicaciones, contraindicaciones, modo de uso). Usa cuando pregunten por detalles tecnicos o fichas de un producto."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![(
                "query",
                PropertySchema::string(
                    "Texto de busqueda: nombre de producto, ingrediente activo, o consulta tecnica",
                ),
            )],
            &["query"],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::SEMANTIC_SEARCH | ToolCapabilities::CATALOG
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let query = required_str(args, "query")?;
        let embedding = context.embedder.embed(query, EmbeddingTask::Query).await?;
        let sheets = context
            .crm
            .match_technical_sheets(&embedding, SHEET_MATCH_THRESHOLD, SHEET_MATCH_COUNT)
            .await?;

        if sheets.is_empty() {
            return Ok("No se encontro informacion tecnica relevante.".to_owned());
        }
        Ok(sheets
            .iter()
            .map(format_sheet)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

// ============================================================================
// GetPreciosMedicamentosTool
// ============================================================================

/// Price lookup
pub struct GetPreciosMedicamentosTool;

#[async_trait]
impl ChatTool for GetPreciosMedicamentosTool {
    fn name(&self) -> &'static str {
        GET_PRECIOS_MEDICAMENTOS
    }

    fn description(&self) -> &'static str {
        "Busca precios de medicamentos por nombre, SKU, o descripcion. Incluye fecha de ultima actualizacion del precio."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![
                (
                    "busqueda",
                    PropertySchema::string("Nombre del producto, SKU, o termino de busqueda"),
                ),
                ("marca", PropertySchema::string("Filtrar por marca (opcional)")),
            ],
            &["busqueda"],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::CATALOG
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let search = required_str(args, "busqueda")?;
        let brand = optional_str(args, "marca");
        let prices = context.crm.product_prices(search, brand).await?;

        if prices.is_empty() {
            return Ok("No se encontraron medicamentos con ese criterio.".to_owned());
        }
        Ok(prices.iter().map(format_price).collect::<Vec<_>>().join("\n"))
    }
}
