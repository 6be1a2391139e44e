// ABOUTME: Module containing all chat tool implementations organized by category
// ABOUTME: Registers the full catalog in the order the tools are declared to the model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Tool Implementations
//!
//! - `catalog` - product search, technical sheets, prices
//! - `clients` - doctor lookup, kit inventory, movements, portfolio sales
//! - `analytics` - cut statistics, rankings, revenue reports

/// Aggregate reporting tools
pub mod analytics;
/// Product catalog tools
pub mod catalog;
/// Doctor-level and portfolio tools
pub mod clients;

use std::sync::Arc;

use super::registry::ToolRegistry;

/// Register every built-in tool
pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(Arc::new(catalog::SearchMedicamentosTool));
    registry.register(Arc::new(catalog::SearchFichasTecnicasTool));
    registry.register(Arc::new(clients::SearchClientesTool));
    registry.register(Arc::new(clients::GetInventarioDoctorTool));
    registry.register(Arc::new(clients::GetMovimientosDoctorTool));
    registry.register(Arc::new(clients::GetClasificacionClienteTool));
    registry.register(Arc::new(clients::GetVentasOdvUsuarioTool));
    registry.register(Arc::new(clients::GetRecoleccionesTool));
    registry.register(Arc::new(analytics::GetEstadisticasCorteTool));
    registry.register(Arc::new(analytics::GetEstadisticasPorMedicoTool));
    registry.register(Arc::new(analytics::GetRankingProductosTool));
    registry.register(Arc::new(analytics::GetRankingVentasTool));
    registry.register(Arc::new(analytics::GetRendimientoMarcasTool));
    registry.register(Arc::new(analytics::GetDatosHistoricosTool));
    registry.register(Arc::new(analytics::GetFacturacionMedicosTool));
    registry.register(Arc::new(analytics::GetRendimientoPorPadecimientoTool));
    registry.register(Arc::new(analytics::GetImpactoBotiquinTool));
    registry.register(Arc::new(catalog::GetPreciosMedicamentosTool));
}

/// Optional text column, `N/A` when missing
fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("N/A")
}

/// Optional amount, `N/A` when missing
fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_owned(), |v| v.to_string())
}
