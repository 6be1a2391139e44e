// ABOUTME: Doctor-level and portfolio tools: client search, kit inventory, movements and sales
// ABOUTME: Results are scoped to the caller's assigned clients unless the role is privileged
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Client Tools
//!
//! - `search_clientes` - resolve a doctor name to an `id_cliente`
//! - `get_inventario_doctor` - current kit inventory
//! - `get_movimientos_doctor` - kit movements and recurring ODV sales
//! - `get_clasificacion_cliente` - M1/M2/M3 product classification
//! - `get_ventas_odv_usuario` - ODV sales across the caller's portfolio
//! - `get_recolecciones` - collection events with their pieces
//!
//! Tools taking an `id_cliente` check the caller's access to that doctor
//! themselves before querying; the scope is still passed down so queries stay
//! filtered.

use async_trait::async_trait;
use serde_json::Value;
use syntia_core::constants::limits::{CLIENT_SEARCH_LIMIT, COLLECTIONS_LIMIT};
use syntia_core::constants::tools::{
    GET_CLASIFICACION_CLIENTE, GET_INVENTARIO_DOCTOR, GET_MOVIMIENTOS_DOCTOR, GET_RECOLECCIONES,
    GET_VENTAS_ODV_USUARIO, SEARCH_CLIENTES,
};
use syntia_core::errors::{AppError, AppResult};

use super::{money, or_na};
use crate::database::crm::{
    ClientMatch, Collection, InventoryItem, Movement, MovementSource, OdvSale,
};
use crate::tools::args::{limit, optional_str, required_str};
use crate::tools::context::ToolExecutionContext;
use crate::tools::schema::{JsonSchema, PropertySchema};
use crate::tools::traits::{ChatTool, ToolCapabilities};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn client_id_property() -> (&'static str, PropertySchema) {
    ("id_cliente", PropertySchema::string("ID del cliente/medico"))
}

fn format_client(client: &ClientMatch) -> String {
    format!(
        "id_cliente: {} | Nombre: {} | Similitud: {:.0}%",
        client.id_cliente,
        client.nombre,
        client.similarity * 100.0
    )
}

fn format_inventory_item(item: &InventoryItem) -> String {
    format!(
        "{}: {} ({}) | Cant: {} | ${} | {}",
        item.sku,
        item.descripcion,
        or_na(item.marca.as_deref()),
        item.cantidad_disponible,
        money(item.precio),
        item.contenido.as_deref().unwrap_or_default(),
    )
}

fn format_movement(movement: &Movement) -> String {
    let date = movement
        .fecha
        .map_or_else(|| "?".to_owned(), |d| d.format(DATE_FORMAT).to_string());
    format!(
        "[{}] {} | {}: {} - {} ({}) x{} @ ${}",
        movement.fuente,
        date,
        movement.tipo,
        movement.sku,
        movement.descripcion,
        or_na(movement.marca.as_deref()),
        movement.cantidad,
        movement.precio.unwrap_or(0.0),
    )
}

fn format_odv_sale(sale: &OdvSale) -> String {
    let date = sale
        .fecha
        .map_or_else(|| "?".to_owned(), |d| d.format(DATE_FORMAT).to_string());
    format!(
        "{} | {} | {}: {} ({}) x{} @ ${}",
        date,
        sale.nombre_cliente,
        sale.sku,
        sale.descripcion,
        or_na(sale.marca.as_deref()),
        sale.cantidad,
        money(sale.precio),
    )
}

fn format_collection(collection: &Collection) -> String {
    let items = if collection.items.is_empty() {
        "Sin items".to_owned()
    } else {
        collection
            .items
            .iter()
            .map(|item| format!("{} x{}", item.sku, item.cantidad))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut line = format!(
        "{} | {} | {} | {} piezas | {}",
        collection.created_at.format(DATE_FORMAT),
        collection.nombre_cliente,
        collection.estado,
        collection.pieces(),
        items
    );
    if let Some(notes) = collection
        .cedis_observaciones
        .as_deref()
        .filter(|n| !n.trim().is_empty())
    {
        line.push_str(" | Obs: ");
        line.push_str(notes);
    }
    line
}

/// Summary header plus one line per collection
#[must_use]
pub fn format_collections(collections: &[Collection]) -> String {
    let total_pieces: i64 = collections.iter().map(Collection::pieces).sum();
    let lines = collections
        .iter()
        .map(format_collection)
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Resumen: {} recolecciones, {} piezas en total\n---\n{}",
        collections.len(),
        total_pieces,
        lines
    )
}

fn join_lines<T>(rows: &[T], format: fn(&T) -> String) -> String {
    rows.iter().map(format).collect::<Vec<_>>().join("\n")
}

// ============================================================================
// SearchClientesTool
// ============================================================================

/// Fuzzy doctor name search
pub struct SearchClientesTool;

#[async_trait]
impl ChatTool for SearchClientesTool {
    fn name(&self) -> &'static str {
        SEARCH_CLIENTES
    }

    fn description(&self) -> &'static str {
        "Busca medicos/clientes por nombre. SIEMPRE usa esta herramienta primero cuando mencionen un nombre de medico para obtener su id_cliente antes de consultar datos del medico."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![(
                "nombre",
                PropertySchema::string(
                    "Nombre del medico a buscar (puede ser parcial, ej: 'Garcia', 'Dr Lopez')",
                ),
            )],
            &["nombre"],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::PORTFOLIO_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let name = required_str(args, "nombre")?;
        let clients = context
            .crm
            .search_clients(name, &context.scope, CLIENT_SEARCH_LIMIT)
            .await?;

        if clients.is_empty() {
            return Ok("No se encontraron medicos con ese nombre.".to_owned());
        }
        Ok(join_lines(&clients, format_client))
    }
}

// ============================================================================
// GetInventarioDoctorTool
// ============================================================================

/// Current kit inventory of a doctor
pub struct GetInventarioDoctorTool;

#[async_trait]
impl ChatTool for GetInventarioDoctorTool {
    fn name(&self) -> &'static str {
        GET_INVENTARIO_DOCTOR
    }

    fn description(&self) -> &'static str {
        "Obtiene el inventario actual del botiquin de un medico especifico. Muestra SKUs, cantidades y precios. Requiere id_cliente (obtenido via search_clientes)."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(vec![client_id_property()], &["id_cliente"])
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::CLIENT_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let client_id = required_str(args, "id_cliente")?;
        context.ensure_client_access(client_id).await?;
        let items = context
            .crm
            .doctor_inventory(client_id, &context.scope)
            .await?;

        if items.is_empty() {
            return Ok("El medico no tiene inventario en botiquin actualmente.".to_owned());
        }
        Ok(join_lines(&items, format_inventory_item))
    }
}

// ============================================================================
// GetMovimientosDoctorTool
// ============================================================================

/// Movement history of a doctor
pub struct GetMovimientosDoctorTool;

#[async_trait]
impl ChatTool for GetMovimientosDoctorTool {
    fn name(&self) -> &'static str {
        GET_MOVIMIENTOS_DOCTOR
    }

    fn description(&self) -> &'static str {
        "Obtiene historial de movimientos de un medico: creaciones, ventas, recolecciones del botiquin y/o ventas recurrentes ODV. Util para tendencias y analisis historico."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![
                client_id_property(),
                (
                    "fuente",
                    PropertySchema::string(
                        "Fuente de datos: 'botiquin' para movimientos de inventario, 'odv' para ventas recurrentes, 'ambos' para todo (default: ambos)",
                    )
                    .with_enum(&["botiquin", "odv", "ambos"]),
                ),
                (
                    "limite",
                    PropertySchema::integer("Numero maximo de resultados (default 30, max 100)"),
                ),
            ],
            &["id_cliente"],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::CLIENT_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let client_id = required_str(args, "id_cliente")?;
        context.ensure_client_access(client_id).await?;
        let source = match optional_str(args, "fuente") {
            Some(raw) => MovementSource::parse(raw).ok_or_else(|| {
                AppError::invalid_input(format!(
                    "Fuente invalida: '{raw}'. Usa botiquin, odv o ambos"
                ))
            })?,
            None => MovementSource::default(),
        };
        let max_rows = limit(args, "limite", 30, 100);

        let movements = context
            .crm
            .doctor_movements(client_id, &context.scope, source, max_rows)
            .await?;

        if movements.is_empty() {
            return Ok("No se encontraron movimientos para este medico.".to_owned());
        }
        Ok(join_lines(&movements, format_movement))
    }
}

// ============================================================================
// GetClasificacionClienteTool
// ============================================================================

/// M1/M2/M3 classification of a doctor's products
pub struct GetClasificacionClienteTool;

#[async_trait]
impl ChatTool for GetClasificacionClienteTool {
    fn name(&self) -> &'static str {
        GET_CLASIFICACION_CLIENTE
    }

    fn description(&self) -> &'static str {
        "Obtiene la clasificacion M1/M2/M3 de productos para un medico. M1=venta directa de botiquin (productos vendidos al corte), M2=conversion (productos vendidos en botiquin que luego se volvieron venta recurrente ODV), M3=exposicion (productos que estuvieron en botiquin y luego aparecieron como venta recurrente ODV sin venta directa previa). Util para estrategia comercial."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(vec![client_id_property()], &["id_cliente"])
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::CLIENT_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let client_id = required_str(args, "id_cliente")?;
        context.ensure_client_access(client_id).await?;
        let rows = context.crm.client_classification(client_id).await?;

        if rows.is_empty() {
            return Ok("No hay clasificacion disponible para este medico.".to_owned());
        }
        Ok(rows
            .iter()
            .map(|row| format!("{}: {}", row.sku, row.clasificacion))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ============================================================================
// GetVentasOdvUsuarioTool
// ============================================================================

/// ODV sales across the caller's portfolio
pub struct GetVentasOdvUsuarioTool;

#[async_trait]
impl ChatTool for GetVentasOdvUsuarioTool {
    fn name(&self) -> &'static str {
        GET_VENTAS_ODV_USUARIO
    }

    fn description(&self) -> &'static str {
        "Obtiene ventas ODV (recurrentes) de TODOS los clientes del usuario actual. Usa para ver el portafolio completo de ventas recurrentes del asesor."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![
                (
                    "sku_filter",
                    PropertySchema::string("Filtrar por SKU especifico (opcional)"),
                ),
                (
                    "limite",
                    PropertySchema::integer("Numero maximo de resultados (default 50, max 200)"),
                ),
            ],
            &[],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA | ToolCapabilities::PORTFOLIO_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let sku = optional_str(args, "sku_filter");
        let max_rows = limit(args, "limite", 50, 200);
        let sales = context.crm.odv_sales(&context.scope, sku, max_rows).await?;

        if sales.is_empty() {
            return Ok("No se encontraron ventas ODV.".to_owned());
        }
        Ok(join_lines(&sales, format_odv_sale))
    }
}

// ============================================================================
// GetRecoleccionesTool
// ============================================================================

/// Collection events of the caller or one doctor
pub struct GetRecoleccionesTool;

#[async_trait]
impl ChatTool for GetRecoleccionesTool {
    fn name(&self) -> &'static str {
        GET_RECOLECCIONES
    }

    fn description(&self) -> &'static str {
        "Obtiene recolecciones (devoluciones de productos) del usuario. Cada recoleccion es un evento de devolucion que contiene multiples items con sus cantidades en piezas. IMPORTANTE: 'recolecciones' son eventos, 'piezas' son la suma de cantidades de items. No confundir el numero de recolecciones con el numero de piezas."
    }

    fn input_schema(&self) -> JsonSchema {
        JsonSchema::object(
            vec![(
                "id_cliente",
                PropertySchema::string(
                    "Filtrar por medico especifico (opcional). Si no se proporciona, devuelve todas las recolecciones del usuario.",
                ),
            )],
            &[],
        )
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities::READS_DATA
            | ToolCapabilities::CLIENT_SCOPED
            | ToolCapabilities::PORTFOLIO_SCOPED
    }

    async fn execute(&self, args: &Value, context: &ToolExecutionContext) -> AppResult<String> {
        let client_id = optional_str(args, "id_cliente");
        if let Some(client_id) = client_id {
            context.ensure_client_access(client_id).await?;
        }
        let collections = context
            .crm
            .collections(&context.scope, client_id, COLLECTIONS_LIMIT)
            .await?;

        if collections.is_empty() {
            return Ok("No se encontraron recolecciones.".to_owned());
        }
        Ok(format_collections(&collections))
    }
}
