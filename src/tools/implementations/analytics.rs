// ABOUTME: Aggregate reporting tools: cut statistics, rankings, brand and condition revenue, kit impact
// ABOUTME: Per-doctor reports are narrowed to the caller's assigned clients for non-privileged roles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Analytics Tools
//!
//! Read-only reports over the whole CRM:
//! - `get_estadisticas_corte` / `get_estadisticas_por_medico` - current cut
//! - `get_ranking_productos` - movement counts per product
//! - `get_ranking_ventas` / `get_rendimiento_marcas` - revenue with M1/M2/M3 split
//! - `get_datos_historicos` - KPIs and per-visit history
//! - `get_facturacion_medicos` - billing composition per doctor
//! - `get_rendimiento_por_padecimiento` - revenue per medical condition
//! - `get_impacto_botiquin` - revenue attributable to the kit

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use syntia_core::constants::limits::MAX_ROWS_PER_DOCTOR_REPORT;
use syntia_core::constants::tools::{
    GET_DATOS_HISTORICOS, GET_ESTADISTICAS_CORTE, GET_ESTADISTICAS_POR_MEDICO,
    GET_FACTURACION_MEDICOS, GET_IMPACTO_BOTIQUIN, GET_RANKING_PRODUCTOS, GET_RANKING_VENTAS,
    GET_RENDIMIENTO_MARCAS, GET_RENDIMIENTO_POR_PADECIMIENTO,
};
use syntia_core::errors::{AppError, AppResult};

use super::or_na;
use crate::database::crm::{ConditionPerformance, DoctorBilling, KitImpact, SalesMetrics};
use crate::tools::args::{date_range, limit};
use crate::tools::context::ToolExecutionContext;
use crate::tools::schema::{JsonSchema, PropertySchema};
use crate::tools::traits::{ChatTool, ToolCapabilities};

/// Ceiling for ranking limits requested by the model
const MAX_RANKING_ROWS: i32 = 100;

fn date_properties(start_description: &'static str) -> Vec<(&'static str, PropertySchema)> {
    vec![
        ("fecha_inicio", PropertySchema::string(start_description)),
        (
            "fecha_fin",
            PropertySchema::string("Fecha fin del periodo en formato YYYY-MM-DD (opcional)"),
        ),
    ]
}

const HISTORY_START: &str =
    "Fecha inicio del periodo en formato YYYY-MM-DD (opcional, sin fecha = toda la historia)";
const PERIOD_START: &str = "Fecha inicio del periodo en formato YYYY-MM-DD (opcional)";

fn aggregate_capabilities() -> ToolCapabilities {
    ToolCapabilities::READS_DATA | ToolCapabilities::AGGREGATE
}

/// Client ids the caller may see, `None` for privileged roles
async fn visible_clients(context: &ToolExecutionContext) -> AppResult<Option<HashSet<String>>> {
    match context.scope.user_id() {
        Some(user_id) => Ok(Some(context.crm.assigned_client_ids(user_id).await?)),
        None => Ok(None),
    }
}

fn metrics_suffix(metrics: &SalesMetrics) -> String {
    format!(
        "Botiquin(M1): {}pz ${} | Conversion(M2): {}pz ${} | Exposicion(M3): {}pz ${} | TOTAL: {}pz ${}",
        metrics.piezas_botiquin,
        metrics.ventas_botiquin,
        metrics.piezas_conversion,
        metrics.ventas_conversion,
        metrics.piezas_exposicion,
        metrics.ventas_exposicion,
        metrics.piezas_totales,
        metrics.ventas_totales,
    )
}

fn format_billing(row: &DoctorBilling) -> String {
    format!(
        "{} | Rango: {} | Fact: ${} | Baseline: ${} | M1: ${} | M2: ${} | M3: ${} | Crec: {}%",
        row.nombre_cliente,
        or_na(row.rango_actual.as_deref()),
        row.facturacion_actual.unwrap_or(0.0),
        row.baseline.unwrap_or(0.0),
        row.current_m1.unwrap_or(0.0),
        row.current_m2.unwrap_or(0.0),
        row.current_m3.unwrap_or(0.0),
        row.pct_crecimiento.unwrap_or(0.0),
    )
}

fn format_condition(row: &ConditionPerformance) -> String {
    format!("{}: ${} | {} piezas", row.padecimiento, row.valor, row.piezas)
}

fn format_kit_impact(impact: &KitImpact) -> String {
    [
        format!(
            "Adopciones (M1→ODV): {} | Revenue: ${}",
            impact.adopciones, impact.revenue_adopciones
        ),
        format!(
            "Conversiones (M2): {} | Revenue: ${}",
            impact.conversiones, impact.revenue_conversiones
        ),
        format!(
            "Exposiciones (M3): {} | Revenue: ${}",
            impact.exposiciones, impact.revenue_exposiciones
        ),
        format!(
            "CrossSell: {} pares | Revenue: ${}",
            impact.crosssell_pares, impact.revenue_crosssell
        ),
        format!("Revenue total impacto: ${}", impact.revenue_total_impacto),
        format!("Revenue total ODV: ${}", impact.revenue_total_odv),
        format!("% impacto botiquin: {}%", impact.porcentaje_impacto),
    ]
    .join("\n")
}

/// Header with the visible total, then at most the per-doctor row cap
fn per_doctor_report<T>(title: &str, rows: &[T], format: impl Fn(&T) -> String) -> String {
    let shown: Vec<String> = rows
        .iter()
        .take(MAX_ROWS_PER_DOCTOR_REPORT)
        .map(format)
        .collect();
    format!(
        "{title} ({} total, mostrando {}):\n{}",
        rows.len(),
        shown.len(),
        shown.join("\n")
    )
}

fn pretty_json(value: &Value) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AppError::serialization(format!("Failed to render report: {e}")))
}

// ============================================================================
// GetEstadisticasCorteTool
// ============================================================================

/// Global statistics of the current cut
pub struct GetEstadisticasCorteTool;

#[async_trait]
impl ChatTool for GetEstadisticasCorteTool {
    fn name(&self) -> &'static str {
        GET_ESTADISTICAS_CORTE
    }

    fn description(&self) -> &'static str {
        "Obtiene estadisticas generales del corte actual: total ventas, creaciones, recolecciones, con comparacion vs corte anterior. Para preguntas sobre cifras globales del periodo."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::empty()
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, _args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        Ok(context.crm.cut_stats().await?.map_or_else(
            || "No hay estadisticas del corte actual.".to_owned(),
            |row| row.to_pretty_json(),
        ))
    }
}

// ============================================================================
// GetEstadisticasPorMedicoTool
// ============================================================================

/// Current cut statistics per doctor
pub struct GetEstadisticasPorMedicoTool;

#[async_trait]
impl ChatTool for GetEstadisticasPorMedicoTool {
    fn name(&self) -> &'static str {
        GET_ESTADISTICAS_POR_MEDICO
    }

    fn description(&self) -> &'static str {
        "Obtiene estadisticas del corte actual desglosadas por medico: ventas, creaciones, recolecciones por doctor. Para rankings o comparaciones entre medicos."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::empty()
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities() | ToolCapabilities::PORTFOLIO_SCOPED
    }

    async fn execute(&self, _args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let mut rows = context.crm.cut_stats_by_doctor().await?;
        if let Some(allowed) = visible_clients(context).await? {
            rows.retain(|row| row.client_id().is_some_and(|id| allowed.contains(&id)));
        }

        if rows.is_empty() {
            return Ok("No hay estadisticas por medico.".to_owned());
        }
        Ok(per_doctor_report("Estadisticas por medico", &rows, |row| {
            row.to_json_line()
        }))
    }
}

// ============================================================================
// GetRankingProductosTool
// ============================================================================

/// Product ranking by movement counts
pub struct GetRankingProductosTool;

#[async_trait]
impl ChatTool for GetRankingProductosTool {
    fn name(&self) -> &'static str {
        GET_RANKING_PRODUCTOS
    }

    fn description(&self) -> &'static str {
        "Obtiene ranking de productos por CONTEO de movimientos (piezas): cuantas piezas se vendieron, crearon, recolectaron, y cuantas hay en stock activo. NO incluye valor monetario — para ingresos/dinero usa get_ranking_ventas."
    }

    fn input_schema(&self) -> JsonSchema {
        let mut properties = vec![(
            "limite",
            PropertySchema::integer("Numero maximo de productos (default 20)"),
        )];
        properties.extend(date_properties(HISTORY_START));
        JsonSchema::object(properties, &[])
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let max_rows = limit(args, "limite", 20, MAX_RANKING_ROWS);
        let range = date_range(args)?;
        let rows = context.crm.product_interest(max_rows, range).await?;

        if rows.is_empty() {
            return Ok("No hay datos de ranking de productos.".to_owned());
        }
        Ok(rows
            .iter()
            .map(|row| row.to_json_line())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// GetRankingVentasTool
// ============================================================================

/// Product ranking by total revenue
pub struct GetRankingVentasTool;

#[async_trait]
impl ChatTool for GetRankingVentasTool {
    fn name(&self) -> &'static str {
        GET_RANKING_VENTAS
    }

    fn description(&self) -> &'static str {
        "Ranking de productos por INGRESOS TOTALES (M1+M2+M3). Incluye desglose: ventas_botiquin (M1=ventas directas de botiquin), ventas_conversion (M2=productos que pasaron de botiquin a ODV), ventas_exposicion (M3=productos expuestos en botiquin que luego se vendieron en ODV). USA ESTA HERRAMIENTA cuando pregunten por dinero, ingresos, o valor de ventas de productos."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![(
                "limite",
                PropertySchema::integer("Maximo de productos (default 20)"),
            )],
            &[],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let max_rows = limit(args, "limite", 20, MAX_RANKING_ROWS);
        let rows = context.crm.sales_ranking(max_rows).await?;

        if rows.is_empty() {
            return Ok("No hay datos de ventas.".to_owned());
        }
        Ok(rows
            .iter()
            .map(|row| {
                format!(
                    "{}: {} ({}) | {}",
                    row.sku,
                    row.descripcion,
                    or_na(row.marca.as_deref()),
                    metrics_suffix(&row.metrics)
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// GetRendimientoMarcasTool
// ============================================================================

/// Revenue per brand
pub struct GetRendimientoMarcasTool;

#[async_trait]
impl ChatTool for GetRendimientoMarcasTool {
    fn name(&self) -> &'static str {
        GET_RENDIMIENTO_MARCAS
    }

    fn description(&self) -> &'static str {
        "Rendimiento por marca con desglose M1/M2/M3: ventas_botiquin (M1), ventas_conversion (M2), ventas_exposicion (M3), y total. USA ESTA HERRAMIENTA para preguntas de ingresos o dinero por marca."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::empty()
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, _args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let rows = context.crm.brand_performance().await?;

        if rows.is_empty() {
            return Ok("No hay datos de rendimiento por marca.".to_owned());
        }
        Ok(rows
            .iter()
            .map(|row| format!("{} | {}", row.marca, metrics_suffix(&row.metrics)))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// GetDatosHistoricosTool
// ============================================================================

/// Historical KPIs and per-visit data
pub struct GetDatosHistoricosTool;

#[async_trait]
impl ChatTool for GetDatosHistoricosTool {
    fn name(&self) -> &'static str {
        GET_DATOS_HISTORICOS
    }

    fn description(&self) -> &'static str {
        "Obtiene datos historicos completos: KPIs globales (ventas M1, creaciones, stock activo, recolecciones) y datos detallados por visita. Sin fechas devuelve TODO el historico. Ideal para preguntas como 'quien ha vendido mas en toda la historia'."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(date_properties(HISTORY_START), &[])
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let range = date_range(args)?;
        match context.crm.historical_data(range).await? {
            Some(value) if !value.is_null() => pretty_json(&value),
            _ => Ok("No hay datos historicos disponibles.".to_owned()),
        }
    }
}

// ============================================================================
// GetFacturacionMedicosTool
// ============================================================================

/// Billing composition per doctor
pub struct GetFacturacionMedicosTool;

#[async_trait]
impl ChatTool for GetFacturacionMedicosTool {
    fn name(&self) -> &'static str {
        GET_FACTURACION_MEDICOS
    }

    fn description(&self) -> &'static str {
        "Obtiene la facturacion y composicion de ventas POR MEDICO: rango (Diamante, Oro, Plata, Bronce), facturacion actual vs baseline, desglose M1/M2/M3, porcentaje de crecimiento. Ideal para ranking de medicos y analisis de cartera."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(date_properties(PERIOD_START), &[])
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities() | ToolCapabilities::PORTFOLIO_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let range = date_range(args)?;
        let mut rows = context.crm.billing_composition(range).await?;
        if let Some(allowed) = visible_clients(context).await? {
            rows.retain(|row| allowed.contains(&row.id_cliente));
        }

        if rows.is_empty() {
            return Ok("No hay datos de facturacion por medico.".to_owned());
        }
        Ok(per_doctor_report(
            "Facturacion por medico",
            &rows,
            format_billing,
        ))
    }
}

// ============================================================================
// GetRendimientoPorPadecimientoTool
// ============================================================================

/// Revenue per medical condition
pub struct GetRendimientoPorPadecimientoTool;

#[async_trait]
impl ChatTool for GetRendimientoPorPadecimientoTool {
    fn name(&self) -> &'static str {
        GET_RENDIMIENTO_POR_PADECIMIENTO
    }

    fn description(&self) -> &'static str {
        "Obtiene rendimiento por padecimiento/condicion medica: valor total e ingresos, piezas vendidas. Para saber que padecimientos generan mas ingresos."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(date_properties(PERIOD_START), &[])
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let range = date_range(args)?;
        let rows = context.crm.condition_performance(range).await?;

        if rows.is_empty() {
            return Ok("No hay datos de rendimiento por padecimiento.".to_owned());
        }
        Ok(rows
            .iter()
            .map(format_condition)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// GetImpactoBotiquinTool
// ============================================================================

/// Revenue attributable to the kit program
pub struct GetImpactoBotiquinTool;

#[async_trait]
impl ChatTool for GetImpactoBotiquinTool {
    fn name(&self) -> &'static str {
        GET_IMPACTO_BOTIQUIN
    }

    fn description(&self) -> &'static str {
        "Obtiene metricas de impacto del botiquin: adopciones (M1→ODV), conversiones (M2), exposiciones (M3), revenue por categoria, porcentaje del revenue total atribuible al botiquin."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(date_properties(PERIOD_START), &[])
    }

    fn capabilities(&self) -> ToolCapabilities {
        aggregate_capabilities()
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let range = date_range(args)?;
        Ok(context.crm.kit_impact(range).await?.map_or_else(
            || "No hay datos de impacto del botiquin.".to_owned(),
            |impact| format_kit_impact(&impact),
        ))
    }
}
