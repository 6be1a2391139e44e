// ABOUTME: Postgres CrmDataSource calling the chatbot and reporting stored procedures
// ABOUTME: Embeddings are bound as pgvector text literals; report rows are read as jsonb
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashSet;
use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use syntia_core::errors::{AppError, AppResult};

use super::{
    BrandSales, ClientMatch, ClientScope, Collection, ConditionPerformance, CrmDataSource,
    DateRange, DoctorBilling, InventoryItem, KitImpact, Movement, MovementSource, OdvSale,
    ProductClassification, ProductMatch, ProductPrice, ProductSales, ReportRow,
    TechnicalSheetMatch,
};
use crate::database::Database;

/// Render an embedding as a pgvector literal (`[0.1,0.2,...]`)
fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

fn query_error(procedure: &str, e: &sqlx::Error) -> AppError {
    AppError::database(format!("{procedure} failed: {e}"))
}

fn into_report_rows(rows: Vec<Json<Map<String, Value>>>) -> Vec<ReportRow> {
    rows.into_iter().map(|Json(map)| ReportRow(map)).collect()
}

#[async_trait]
impl CrmDataSource for Database {
    async fn client_belongs_to(&self, client_id: &str, user_id: &str) -> AppResult<bool> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM clientes
                WHERE id_cliente::text = $1 AND id_usuario::text = $2
            )
            ",
        )
        .bind(client_id)
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(|e| query_error("client ownership check", &e))
    }

    async fn assigned_client_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id_cliente::text FROM clientes WHERE id_usuario::text = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("assigned clients", &e))?;
        Ok(ids.into_iter().collect())
    }

    async fn match_products(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<ProductMatch>> {
        sqlx::query_as(
            r"
            SELECT sku::text, descripcion::text, marca::text, precio::float8,
                   contenido::text, padecimientos::text
            FROM chatbot.match_medicamentos($1::vector, $2, $3)
            ",
        )
        .bind(vector_literal(embedding))
        .bind(threshold)
        .bind(count)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("match_medicamentos", &e))
    }

    async fn match_technical_sheets(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<TechnicalSheetMatch>> {
        sqlx::query_as(
            "SELECT sku::text, content::text FROM chatbot.match_fichas($1::vector, $2, $3)",
        )
        .bind(vector_literal(embedding))
        .bind(threshold)
        .bind(count)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("match_fichas", &e))
    }

    async fn search_clients(
        &self,
        name: &str,
        scope: &ClientScope,
        limit: i32,
    ) -> AppResult<Vec<ClientMatch>> {
        sqlx::query_as(
            r"
            SELECT id_cliente::text, nombre::text, similarity::float8
            FROM chatbot.fuzzy_search_clientes($1, $2, $3)
            ",
        )
        .bind(name)
        .bind(scope.user_id())
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("fuzzy_search_clientes", &e))
    }

    async fn doctor_inventory(
        &self,
        client_id: &str,
        scope: &ClientScope,
    ) -> AppResult<Vec<InventoryItem>> {
        sqlx::query_as(
            r"
            SELECT sku::text, descripcion::text, marca::text,
                   cantidad_disponible::int8, precio::float8, contenido::text
            FROM chatbot.get_inventario_doctor($1, $2, $3)
            ",
        )
        .bind(client_id)
        .bind(scope.user_id())
        .bind(scope.is_global())
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_inventario_doctor", &e))
    }

    async fn doctor_movements(
        &self,
        client_id: &str,
        scope: &ClientScope,
        source: MovementSource,
        limit: i32,
    ) -> AppResult<Vec<Movement>> {
        sqlx::query_as(
            r"
            SELECT fuente::text, fecha::date, tipo::text, sku::text, descripcion::text,
                   marca::text, cantidad::int8, precio::float8
            FROM chatbot.get_movimientos_doctor($1, $2, $3, $4, $5)
            ",
        )
        .bind(client_id)
        .bind(scope.user_id())
        .bind(scope.is_global())
        .bind(source.as_str())
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_movimientos_doctor", &e))
    }

    async fn client_classification(&self, client_id: &str) -> AppResult<Vec<ProductClassification>> {
        sqlx::query_as(
            "SELECT sku::text, clasificacion::text FROM chatbot.clasificacion_por_cliente($1)",
        )
        .bind(client_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("clasificacion_por_cliente", &e))
    }

    async fn odv_sales(
        &self,
        scope: &ClientScope,
        sku_filter: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<OdvSale>> {
        sqlx::query_as(
            r"
            SELECT id_cliente::text, fecha::date, nombre_cliente::text, sku::text,
                   descripcion::text, marca::text, cantidad::int8, precio::float8
            FROM chatbot.get_ventas_odv_usuario($1, $2, $3, $4)
            ",
        )
        .bind(scope.user_id())
        .bind(scope.is_global())
        .bind(sku_filter)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_ventas_odv_usuario", &e))
    }

    async fn collections(
        &self,
        scope: &ClientScope,
        client_id: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<Collection>> {
        sqlx::query_as(
            r"
            SELECT id_cliente::text, created_at::timestamptz, nombre_cliente::text,
                   estado::text, cedis_observaciones::text,
                   COALESCE(items::jsonb, '[]'::jsonb) AS items
            FROM chatbot.get_recolecciones_usuario($1, $2, $3, $4)
            ",
        )
        .bind(scope.user_id())
        .bind(client_id)
        .bind(limit)
        .bind(scope.is_global())
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_recolecciones_usuario", &e))
    }

    async fn cut_stats(&self) -> AppResult<Option<ReportRow>> {
        let row: Option<Json<Map<String, Value>>> = sqlx::query_scalar(
            "SELECT to_jsonb(t) FROM public.get_corte_stats_generales_con_comparacion() t LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| query_error("get_corte_stats_generales_con_comparacion", &e))?;
        Ok(row.map(|Json(map)| ReportRow(map)))
    }

    async fn cut_stats_by_doctor(&self) -> AppResult<Vec<ReportRow>> {
        let rows = sqlx::query_scalar(
            "SELECT to_jsonb(t) FROM public.get_corte_stats_por_medico_con_comparacion() t",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_corte_stats_por_medico_con_comparacion", &e))?;
        Ok(into_report_rows(rows))
    }

    async fn product_interest(&self, limit: i32, range: DateRange) -> AppResult<Vec<ReportRow>> {
        let rows = sqlx::query_scalar(
            "SELECT to_jsonb(t) FROM public.get_product_interest($1, $2, $3) t",
        )
        .bind(limit)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_product_interest", &e))?;
        Ok(into_report_rows(rows))
    }

    async fn sales_ranking(&self, limit: i32) -> AppResult<Vec<ProductSales>> {
        sqlx::query_as(
            r"
            SELECT sku::text, descripcion::text, marca::text,
                   piezas_botiquin::int8, ventas_botiquin::float8,
                   piezas_conversion::int8, ventas_conversion::float8,
                   piezas_exposicion::int8, ventas_exposicion::float8,
                   piezas_totales::int8, ventas_totales::float8
            FROM chatbot.get_ranking_ventas_completo($1)
            ",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_ranking_ventas_completo", &e))
    }

    async fn brand_performance(&self) -> AppResult<Vec<BrandSales>> {
        sqlx::query_as(
            r"
            SELECT marca::text,
                   piezas_botiquin::int8, ventas_botiquin::float8,
                   piezas_conversion::int8, ventas_conversion::float8,
                   piezas_exposicion::int8, ventas_exposicion::float8,
                   piezas_totales::int8, ventas_totales::float8
            FROM chatbot.get_rendimiento_marcas_completo()
            ",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_rendimiento_marcas_completo", &e))
    }

    async fn historical_data(&self, range: DateRange) -> AppResult<Option<Value>> {
        let data: Option<Json<Value>> = sqlx::query_scalar(
            "SELECT to_jsonb(public.get_corte_historico_data($1, $2))",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| query_error("get_corte_historico_data", &e))?;
        Ok(data.map(|Json(value)| value).filter(|value| !value.is_null()))
    }

    async fn billing_composition(&self, range: DateRange) -> AppResult<Vec<DoctorBilling>> {
        sqlx::query_as(
            r"
            SELECT id_cliente::text, nombre_cliente::text, rango_actual::text,
                   facturacion_actual::float8, baseline::float8,
                   current_m1::float8, current_m2::float8, current_m3::float8,
                   pct_crecimiento::float8
            FROM public.get_facturacion_composicion($1, $2)
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_facturacion_composicion", &e))
    }

    async fn condition_performance(
        &self,
        range: DateRange,
    ) -> AppResult<Vec<ConditionPerformance>> {
        sqlx::query_as(
            r"
            SELECT padecimiento::text, valor::float8, piezas::int8
            FROM public.get_padecimiento_performance($1, $2)
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_padecimiento_performance", &e))
    }

    async fn kit_impact(&self, range: DateRange) -> AppResult<Option<KitImpact>> {
        sqlx::query_as(
            r"
            SELECT adopciones::int8, revenue_adopciones::float8,
                   conversiones::int8, revenue_conversiones::float8,
                   exposiciones::int8, revenue_exposiciones::float8,
                   crosssell_pares::int8, revenue_crosssell::float8,
                   revenue_total_impacto::float8, revenue_total_odv::float8,
                   porcentaje_impacto::float8
            FROM public.get_impacto_botiquin_resumen($1, $2)
            LIMIT 1
            ",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| query_error("get_impacto_botiquin_resumen", &e))
    }

    async fn product_prices(
        &self,
        search: &str,
        brand: Option<&str>,
    ) -> AppResult<Vec<ProductPrice>> {
        sqlx::query_as(
            r"
            SELECT sku::text, descripcion::text, marca::text, precio::float8,
                   contenido::text, ultima_actualizacion::timestamptz
            FROM chatbot.get_precios_medicamentos($1, $2)
            ",
        )
        .bind(search)
        .bind(brand)
        .fetch_all(self.pool())
        .await
        .map_err(|e| query_error("get_precios_medicamentos", &e))
    }
}
