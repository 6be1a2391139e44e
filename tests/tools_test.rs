// ABOUTME: Tests for tool dispatch: access checks, portfolio scoping, error rendering and truncation
// ABOUTME: Runs the built-in catalog against an in-memory CRM fixture
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{init_test_logging, user, FixedEmbedder, ADMIN_ID, ASESOR_ID, QUERY_VECTOR};
use serde_json::{json, Value};
use syntia_chat::{
    constants::messages::{CLIENT_ACCESS_DENIED, TRUNCATION_SUFFIX},
    database::{
        crm::{InventoryItem, ProductMatch, ReportRow},
        memory::{CrmFixture, MemoryCrm},
    },
    llm::FunctionCall,
    models::UserRole,
    errors::ErrorCode,
    tools::{
        implementations::clients::{
            GetClasificacionClienteTool, GetInventarioDoctorTool, GetMovimientosDoctorTool,
            GetRecoleccionesTool,
        },
        ChatTool, ToolCapabilities, ToolExecutionContext, ToolRegistry,
    },
};

fn call(name: &str, args: Value) -> FunctionCall {
    FunctionCall {
        name: name.to_owned(),
        args,
        id: None,
    }
}

fn report(value: Value) -> ReportRow {
    ReportRow(value.as_object().cloned().unwrap())
}

fn fixture() -> CrmFixture {
    CrmFixture {
        assignments: vec![
            ("MED-1".to_owned(), ASESOR_ID.to_owned()),
            ("MED-2".to_owned(), "asesor-9".to_owned()),
        ],
        clients: vec![
            ("MED-1".to_owned(), "Dra. Ana Garcia".to_owned()),
            ("MED-2".to_owned(), "Dr. Luis Garcia".to_owned()),
        ],
        inventory: vec![
            (
                "MED-1".to_owned(),
                InventoryItem {
                    sku: "SKU-1".to_owned(),
                    descripcion: "Omeprazol 20mg".to_owned(),
                    marca: None,
                    cantidad_disponible: 4,
                    precio: Some(120.5),
                    contenido: Some("30 capsulas".to_owned()),
                },
            ),
            (
                "MED-2".to_owned(),
                InventoryItem {
                    sku: "SKU-2".to_owned(),
                    descripcion: "Loratadina 10mg".to_owned(),
                    marca: Some("Alergia".to_owned()),
                    cantidad_disponible: 2,
                    precio: None,
                    contenido: None,
                },
            ),
        ],
        cut_stats_by_doctor: vec![
            report(json!({ "id_cliente": "MED-1", "ventas": 10 })),
            report(json!({ "id_cliente": "MED-2", "ventas": 3 })),
        ],
        products: vec![(
            QUERY_VECTOR.to_vec(),
            ProductMatch {
                sku: "SKU-1".to_owned(),
                descripcion: "Omeprazol 20mg".to_owned(),
                marca: Some("Gastro".to_owned()),
                precio: Some(120.5),
                contenido: Some("30 capsulas".to_owned()),
                padecimientos: Some("Gastritis".to_owned()),
            },
        )],
        ..CrmFixture::default()
    }
}

fn context(role: UserRole, crm: MemoryCrm) -> ToolExecutionContext {
    init_test_logging();
    let id = if role.is_admin() { ADMIN_ID } else { ASESOR_ID };
    ToolExecutionContext::new(user(id, role), Arc::new(crm), Arc::new(FixedEmbedder::default()))
}

fn registry() -> ToolRegistry {
    ToolRegistry::builtin(8000)
}

#[test]
fn test_catalog_is_declared_in_order() {
    let registry = registry();
    assert_eq!(registry.len(), 18);

    let declarations = registry.declarations();
    assert_eq!(declarations.len(), 18);
    assert_eq!(declarations[0].name, "search_medicamentos");
    assert_eq!(declarations[17].name, "get_precios_medicamentos");

    let scoped = |name: &str| {
        registry
            .get(name)
            .is_some_and(|tool| tool.capabilities().contains(ToolCapabilities::CLIENT_SCOPED))
    };
    assert!(scoped("get_inventario_doctor"));
    assert!(!scoped("search_medicamentos"));
}

#[tokio::test]
async fn test_inventory_of_assigned_doctor() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(&call("get_inventario_doctor", json!({ "id_cliente": "MED-1" })), &ctx)
        .await;

    assert_eq!(text, "SKU-1: Omeprazol 20mg (N/A) | Cant: 4 | $120.5 | 30 capsulas");
}

#[tokio::test]
async fn test_advisor_denied_unassigned_doctor() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    for tool in ["get_inventario_doctor", "get_movimientos_doctor", "get_clasificacion_cliente"] {
        let text = registry()
            .execute(&call(tool, json!({ "id_cliente": "MED-2" })), &ctx)
            .await;
        assert_eq!(text, CLIENT_ACCESS_DENIED, "{tool}");
    }
}

#[tokio::test]
async fn test_doctor_tools_check_access_when_called_directly() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));
    let args = json!({ "id_cliente": "MED-2" });
    let tools: [&dyn ChatTool; 4] = [
        &GetInventarioDoctorTool,
        &GetMovimientosDoctorTool,
        &GetClasificacionClienteTool,
        &GetRecoleccionesTool,
    ];

    for tool in tools {
        let err = tool.execute(&args, &ctx).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied, "{}", tool.name());
        assert_eq!(err.message, CLIENT_ACCESS_DENIED);
    }

    let own = GetInventarioDoctorTool
        .execute(&json!({ "id_cliente": "MED-1" }), &ctx)
        .await
        .unwrap();
    assert!(own.starts_with("SKU-1"));
}

#[tokio::test]
async fn test_admin_sees_every_doctor() {
    let ctx = context(UserRole::Administrador, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(&call("get_inventario_doctor", json!({ "id_cliente": "MED-2" })), &ctx)
        .await;

    assert!(text.starts_with("SKU-2: Loratadina 10mg (Alergia) | Cant: 2 | $N/A"));
}

#[tokio::test]
async fn test_client_search_is_scoped_to_portfolio() {
    let registry = registry();
    let args = json!({ "nombre": "garcia" });

    let advisor = registry
        .execute(&call("search_clientes", args.clone()), &context(UserRole::Asesor, MemoryCrm::new(fixture())))
        .await;
    assert!(advisor.contains("id_cliente: MED-1"));
    assert!(!advisor.contains("MED-2"));

    let admin = registry
        .execute(&call("search_clientes", args), &context(UserRole::Owner, MemoryCrm::new(fixture())))
        .await;
    assert_eq!(admin.lines().count(), 2);
}

#[tokio::test]
async fn test_per_doctor_report_keeps_only_assigned_rows() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(&call("get_estadisticas_por_medico", json!({})), &ctx)
        .await;

    assert!(text.starts_with("Estadisticas por medico (1 total, mostrando 1):"));
    assert!(text.contains("\"MED-1\""));
    assert!(!text.contains("\"MED-2\""));
}

#[tokio::test]
async fn test_product_search_formats_matches() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(&call("search_medicamentos", json!({ "query": "gastritis" })), &ctx)
        .await;

    assert_eq!(
        text,
        "SKU-1: Omeprazol 20mg (Gastro) $120.5 | 30 capsulas | Padecimientos: Gastritis"
    );
}

#[tokio::test]
async fn test_missing_argument_is_reported() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(&call("search_medicamentos", json!({})), &ctx)
        .await;

    assert_eq!(text, "Error: Falta el parametro requerido: query");
}

#[tokio::test]
async fn test_invalid_date_is_reported() {
    let ctx = context(UserRole::Administrador, MemoryCrm::new(fixture()));

    let text = registry()
        .execute(
            &call("get_ranking_productos", json!({ "fecha_inicio": "ayer" })),
            &ctx,
        )
        .await;

    assert!(text.starts_with("Error: Fecha invalida en fecha_inicio"));
}

#[tokio::test]
async fn test_data_source_failure_is_rendered() {
    let crm = MemoryCrm::new(fixture()).failing("get_inventario_doctor");
    let ctx = context(UserRole::Administrador, crm);

    let text = registry()
        .execute(&call("get_inventario_doctor", json!({ "id_cliente": "MED-1" })), &ctx)
        .await;

    assert_eq!(text, "Error: get_inventario_doctor failed: connection reset");
}

#[tokio::test]
async fn test_failed_access_check_is_rendered() {
    let crm = MemoryCrm::new(fixture()).failing("clientes");
    let ctx = context(UserRole::Asesor, crm);

    let text = registry()
        .execute(&call("get_inventario_doctor", json!({ "id_cliente": "MED-1" })), &ctx)
        .await;

    assert_eq!(text, "Error: clientes failed: connection reset");
}

#[tokio::test]
async fn test_unknown_tool() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = registry().execute(&call("drop_tables", json!({})), &ctx).await;

    assert_eq!(text, "Herramienta desconocida: drop_tables");
}

#[tokio::test]
async fn test_long_results_are_truncated() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));

    let text = ToolRegistry::builtin(10)
        .execute(&call("get_inventario_doctor", json!({ "id_cliente": "MED-1" })), &ctx)
        .await;

    assert_eq!(text, format!("SKU-1: Ome{TRUNCATION_SUFFIX}"));
}

#[tokio::test]
async fn test_round_results_keep_call_order() {
    let ctx = context(UserRole::Asesor, MemoryCrm::new(fixture()));
    let calls = vec![
        call("get_inventario_doctor", json!({ "id_cliente": "MED-2" })),
        call("get_inventario_doctor", json!({ "id_cliente": "MED-1" })),
        call("nada", json!({})),
    ];

    let responses = registry().execute_all(&calls, &ctx).await;

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0].response, json!({ "result": CLIENT_ACCESS_DENIED }));
    assert!(responses[1].response["result"].as_str().unwrap().starts_with("SKU-1"));
    assert_eq!(responses[2].name, "nada");
}
