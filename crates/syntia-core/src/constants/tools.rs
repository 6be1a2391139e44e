// ABOUTME: Tool identifiers exposed to the generative model
// ABOUTME: Names double as registry keys and function declaration names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Semantic product search
pub const SEARCH_MEDICAMENTOS: &str = "search_medicamentos";
/// Semantic technical-sheet search
pub const SEARCH_FICHAS_TECNICAS: &str = "search_fichas_tecnicas";
/// Fuzzy doctor/client name search
pub const SEARCH_CLIENTES: &str = "search_clientes";
/// Current kit inventory of a doctor
pub const GET_INVENTARIO_DOCTOR: &str = "get_inventario_doctor";
/// Movement history of a doctor
pub const GET_MOVIMIENTOS_DOCTOR: &str = "get_movimientos_doctor";
/// M1/M2/M3 product classification of a doctor
pub const GET_CLASIFICACION_CLIENTE: &str = "get_clasificacion_cliente";
/// Recurring sales across the caller's clients
pub const GET_VENTAS_ODV_USUARIO: &str = "get_ventas_odv_usuario";
/// Product collection events
pub const GET_RECOLECCIONES: &str = "get_recolecciones";
/// Global stats of the current cut
pub const GET_ESTADISTICAS_CORTE: &str = "get_estadisticas_corte";
/// Per-doctor stats of the current cut
pub const GET_ESTADISTICAS_POR_MEDICO: &str = "get_estadisticas_por_medico";
/// Product ranking by movement counts
pub const GET_RANKING_PRODUCTOS: &str = "get_ranking_productos";
/// Product ranking by revenue
pub const GET_RANKING_VENTAS: &str = "get_ranking_ventas";
/// Revenue per brand
pub const GET_RENDIMIENTO_MARCAS: &str = "get_rendimiento_marcas";
/// Historical KPIs
pub const GET_DATOS_HISTORICOS: &str = "get_datos_historicos";
/// Billing composition per doctor
pub const GET_FACTURACION_MEDICOS: &str = "get_facturacion_medicos";
/// Revenue per medical condition
pub const GET_RENDIMIENTO_POR_PADECIMIENTO: &str = "get_rendimiento_por_padecimiento";
/// Kit impact metrics
pub const GET_IMPACTO_BOTIQUIN: &str = "get_impacto_botiquin";
/// Price lookup
pub const GET_PRECIOS_MEDICAMENTOS: &str = "get_precios_medicamentos";
