// ABOUTME: CRM read interface behind the retrieval tools (catalog, doctors, sales, reports)
// ABOUTME: Defines caller scoping, query filters and the CrmDataSource trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # CRM Data Source
//!
//! One method per stored procedure the tools call. Methods that touch a
//! specific doctor or an advisor's portfolio take a [`ClientScope`]; the
//! catalog and aggregate report methods are global.

/// Postgres implementation
pub mod postgres;
/// Typed result rows
pub mod rows;

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use syntia_core::errors::AppResult;
use syntia_core::models::User;

pub use rows::{
    BrandSales, ClientMatch, Collection, CollectionItem, ConditionPerformance, DoctorBilling,
    InventoryItem, KitImpact, Movement, OdvSale, ProductClassification, ProductMatch,
    ProductPrice, ProductSales, ReportRow, SalesMetrics, TechnicalSheetMatch,
};

/// Which clients a caller may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientScope {
    /// Privileged roles see every client
    All,
    /// Other roles see only clients assigned to this user id
    AssignedTo(String),
}

impl ClientScope {
    /// Scope for `user` based on its role
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        if user.is_admin() {
            Self::All
        } else {
            Self::AssignedTo(user.id.clone())
        }
    }

    /// Restricting user id, `None` when global
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::AssignedTo(id) => Some(id),
        }
    }

    /// Whether the scope is unrestricted
    #[must_use]
    pub const fn is_global(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Movement source for a doctor's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementSource {
    /// Kit (botiquin) inventory movements
    Botiquin,
    /// Recurring ODV sales
    Odv,
    /// Both sources
    #[default]
    Ambos,
}

impl MovementSource {
    /// Parse the tool argument value
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "botiquin" => Some(Self::Botiquin),
            "odv" => Some(Self::Odv),
            "ambos" => Some(Self::Ambos),
            _ => None,
        }
    }

    /// Value passed to the stored procedure
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Botiquin => "botiquin",
            Self::Odv => "odv",
            Self::Ambos => "ambos",
        }
    }
}

impl fmt::Display for MovementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional inclusive date window; an open bound means "all history"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day
    pub start: Option<NaiveDate>,
    /// Last day
    pub end: Option<NaiveDate>,
}

/// Read access to CRM data for the retrieval tools
#[async_trait]
pub trait CrmDataSource: Send + Sync {
    /// Whether `client_id` is assigned to `user_id`
    async fn client_belongs_to(&self, client_id: &str, user_id: &str) -> AppResult<bool>;

    /// Every client id assigned to `user_id`
    async fn assigned_client_ids(&self, user_id: &str) -> AppResult<HashSet<String>>;

    /// Products whose embedding is at least `threshold` similar to `embedding`
    async fn match_products(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<ProductMatch>>;

    /// Technical sheet chunks similar to `embedding`
    async fn match_technical_sheets(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<TechnicalSheetMatch>>;

    /// Fuzzy client name search ranked by similarity
    async fn search_clients(
        &self,
        name: &str,
        scope: &ClientScope,
        limit: i32,
    ) -> AppResult<Vec<ClientMatch>>;

    /// Current kit inventory of a doctor
    async fn doctor_inventory(
        &self,
        client_id: &str,
        scope: &ClientScope,
    ) -> AppResult<Vec<InventoryItem>>;

    /// Movement history of a doctor, newest first
    async fn doctor_movements(
        &self,
        client_id: &str,
        scope: &ClientScope,
        source: MovementSource,
        limit: i32,
    ) -> AppResult<Vec<Movement>>;

    /// M1/M2/M3 product classification of a doctor
    async fn client_classification(&self, client_id: &str) -> AppResult<Vec<ProductClassification>>;

    /// ODV sales across the caller's portfolio
    async fn odv_sales(
        &self,
        scope: &ClientScope,
        sku_filter: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<OdvSale>>;

    /// Collection (return) events with their items
    async fn collections(
        &self,
        scope: &ClientScope,
        client_id: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<Collection>>;

    /// General statistics of the current cut with comparison
    async fn cut_stats(&self) -> AppResult<Option<ReportRow>>;

    /// Current cut statistics per doctor
    async fn cut_stats_by_doctor(&self) -> AppResult<Vec<ReportRow>>;

    /// Product ranking by movement counts
    async fn product_interest(&self, limit: i32, range: DateRange) -> AppResult<Vec<ReportRow>>;

    /// Product ranking by revenue with M1/M2/M3 breakdown
    async fn sales_ranking(&self, limit: i32) -> AppResult<Vec<ProductSales>>;

    /// Revenue per brand with M1/M2/M3 breakdown
    async fn brand_performance(&self) -> AppResult<Vec<BrandSales>>;

    /// Historical KPIs and per-visit data
    async fn historical_data(&self, range: DateRange) -> AppResult<Option<Value>>;

    /// Billing composition per doctor
    async fn billing_composition(&self, range: DateRange) -> AppResult<Vec<DoctorBilling>>;

    /// Revenue per medical condition
    async fn condition_performance(&self, range: DateRange)
        -> AppResult<Vec<ConditionPerformance>>;

    /// Kit impact summary
    async fn kit_impact(&self, range: DateRange) -> AppResult<Option<KitImpact>>;

    /// Price lookup by name, SKU or description
    async fn product_prices(&self, search: &str, brand: Option<&str>)
        -> AppResult<Vec<ProductPrice>>;
}
