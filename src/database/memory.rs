// ABOUTME: In-process implementations of every store for tests and local runs
// ABOUTME: DashMap-backed conversations, usage counters and users plus a fixture-driven CRM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # In-Memory Stores
//!
//! [`MemoryStore`] implements conversations, configuration, usage metering
//! and the user directory. The usage check-and-increment runs under the
//! counter's map-entry lock, which gives the same single-winner guarantee as
//! the stored procedure.
//!
//! [`MemoryCrm`] serves CRM rows from a [`CrmFixture`] and can be told to fail
//! specific procedures so error rendering can be exercised.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde_json::Value;
use syntia_core::errors::{AppError, AppResult};
use syntia_core::models::{
    ConversationHistory, ConversationRecord, HistoryMessage, MessageOwnership, MessageRecord,
    MessageRole, NewTurn, PersistedTurn, UsageSnapshot, User,
};
use uuid::Uuid;

use super::crm::{
    BrandSales, ClientMatch, ClientScope, Collection, ConditionPerformance, CrmDataSource,
    DateRange, DoctorBilling, InventoryItem, KitImpact, Movement, MovementSource, OdvSale,
    ProductClassification, ProductMatch, ProductPrice, ProductSales, ReportRow,
    TechnicalSheetMatch,
};
use super::{ConfigStore, ConversationStore, UsageLimiter, UserDirectory};

/// Daily allowance when no per-user limit is configured
pub const DEFAULT_DAILY_LIMIT: i32 = 20;

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct UsageCounter {
    day: NaiveDate,
    used: i32,
}

/// Conversations, config, usage and users held in process memory
#[derive(Debug)]
pub struct MemoryStore {
    conversations: DashMap<Uuid, ConversationRecord>,
    messages: DashMap<Uuid, Vec<MessageRecord>>,
    usage: DashMap<String, UsageCounter>,
    limits: DashMap<String, i32>,
    users: DashMap<String, User>,
    system_prompt: RwLock<Option<String>>,
    default_limit: i32,
    fail_appends: AtomicBool,
    prompt_loads: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store with [`DEFAULT_DAILY_LIMIT`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
            messages: DashMap::new(),
            usage: DashMap::new(),
            limits: DashMap::new(),
            users: DashMap::new(),
            system_prompt: RwLock::new(None),
            default_limit: DEFAULT_DAILY_LIMIT,
            fail_appends: AtomicBool::new(false),
            prompt_loads: AtomicUsize::new(0),
        }
    }

    /// Set the agent instruction text
    #[must_use]
    pub fn with_system_prompt(self, prompt: impl Into<String>) -> Self {
        if let Ok(mut slot) = self.system_prompt.write() {
            *slot = Some(prompt.into());
        }
        self
    }

    /// Register a user reachable by its identity-provider account id
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.auth_user_id.clone(), user);
    }

    /// Override the daily allowance of `user_id`
    pub fn set_limit(&self, user_id: &str, limit: i32) {
        self.limits.insert(user_id.to_owned(), limit);
    }

    /// Queries counted today for `user_id`
    #[must_use]
    pub fn queries_used(&self, user_id: &str) -> i32 {
        let today = Utc::now().date_naive();
        self.usage
            .get(user_id)
            .filter(|counter| counter.day == today)
            .map_or(0, |counter| counter.used)
    }

    /// Make subsequent `append_turn` calls fail
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Number of times the system prompt was read
    #[must_use]
    pub fn prompt_loads(&self) -> usize {
        self.prompt_loads.load(Ordering::SeqCst)
    }

    /// Number of messages stored in `conversation_id`
    #[must_use]
    pub fn message_count(&self, conversation_id: Uuid) -> usize {
        self.messages.get(&conversation_id).map_or(0, |m| m.len())
    }

    /// Total messages across all conversations
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }

    /// Current record of a conversation
    #[must_use]
    pub fn conversation(&self, id: Uuid) -> Option<ConversationRecord> {
        self.conversations.get(&id).map(|c| c.clone())
    }

    /// Insert a conversation with pre-existing messages
    pub fn seed_conversation(
        &self,
        user_id: &str,
        summary: Option<&str>,
        messages: &[HistoryMessage],
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conversations.insert(
            id,
            ConversationRecord {
                id,
                user_id: user_id.to_owned(),
                summary: summary.map(ToOwned::to_owned),
                created_at: now,
                updated_at: now,
            },
        );
        let rows = messages
            .iter()
            .map(|m| Self::record(id, m.role, &m.content, None))
            .collect();
        self.messages.insert(id, rows);
        id
    }

    fn limit_for(&self, user_id: &str) -> i32 {
        self.limits
            .get(user_id)
            .map_or(self.default_limit, |limit| *limit)
    }

    fn record(
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
        context_client_id: Option<&str>,
    ) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4(),
            conversation_id,
            role,
            content: content.to_owned(),
            context_client_id: context_client_id.map(ToOwned::to_owned),
            tokens_input: None,
            tokens_output: None,
            latency_ms: None,
            rating: None,
            rated_at: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_owned(&self, id: Uuid, user_id: &str) -> AppResult<Option<ConversationRecord>> {
        Ok(self
            .conversations
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .map(|c| c.clone()))
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<ConversationRecord>> {
        Ok(self.conversation(id))
    }

    async fn create(&self, user_id: &str) -> AppResult<ConversationRecord> {
        let now = Utc::now();
        let record = ConversationRecord {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            summary: None,
            created_at: now,
            updated_at: now,
        };
        self.conversations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn load_history(&self, id: Uuid) -> AppResult<ConversationHistory> {
        let summary = self.conversations.get(&id).and_then(|c| c.summary.clone());
        let messages = self
            .messages
            .get(&id)
            .map(|rows| {
                rows.iter()
                    .map(|m| HistoryMessage {
                        role: m.role,
                        content: m.content.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ConversationHistory { summary, messages })
    }

    async fn previous_summaries(
        &self,
        user_id: &str,
        exclude: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<String>> {
        let mut owned: Vec<ConversationRecord> = self
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id && c.summary.is_some() && Some(c.id) != exclude)
            .map(|c| c.clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned
            .into_iter()
            .filter_map(|c| c.summary)
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn append_turn(&self, turn: &NewTurn) -> AppResult<PersistedTurn> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(AppError::database("Failed to insert user message: simulated"));
        }
        if !self.conversations.contains_key(&turn.conversation_id) {
            return Err(AppError::database("Failed to insert user message: no conversation"));
        }

        let user_row = Self::record(
            turn.conversation_id,
            MessageRole::User,
            &turn.user_message,
            turn.context_client_id.as_deref(),
        );
        let assistant_row = MessageRecord {
            tokens_input: Some(turn.tokens_input),
            tokens_output: Some(turn.tokens_output),
            latency_ms: Some(turn.latency_ms),
            ..Self::record(
                turn.conversation_id,
                MessageRole::Assistant,
                &turn.assistant_message,
                turn.context_client_id.as_deref(),
            )
        };
        let persisted = PersistedTurn {
            user_message_id: user_row.id,
            assistant_message_id: assistant_row.id,
        };

        self.messages
            .entry(turn.conversation_id)
            .or_default()
            .extend([user_row, assistant_row]);
        if let Some(mut conversation) = self.conversations.get_mut(&turn.conversation_id) {
            conversation.updated_at = Utc::now();
        }
        Ok(persisted)
    }

    async fn update_summary(&self, id: Uuid, summary: &str) -> AppResult<()> {
        if let Some(mut conversation) = self.conversations.get_mut(&id) {
            conversation.summary = Some(summary.to_owned());
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn message_ownership(&self, message_id: Uuid) -> AppResult<Option<MessageOwnership>> {
        for entry in &self.messages {
            if let Some(message) = entry.value().iter().find(|m| m.id == message_id) {
                let owner_id = self
                    .conversations
                    .get(entry.key())
                    .map(|c| c.user_id.clone())
                    .unwrap_or_default();
                return Ok(Some(MessageOwnership {
                    id: message.id,
                    role: message.role,
                    owner_id,
                }));
            }
        }
        Ok(None)
    }

    async fn rate_message(&self, message_id: Uuid, rating: i16) -> AppResult<()> {
        for mut entry in self.messages.iter_mut() {
            if let Some(message) = entry.value_mut().iter_mut().find(|m| m.id == message_id) {
                message.rating = Some(rating);
                message.rated_at = Some(Utc::now());
                break;
            }
        }
        Ok(())
    }

    async fn list_messages(&self, id: Uuid) -> AppResult<Vec<MessageRecord>> {
        Ok(self
            .messages
            .get(&id)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn system_prompt(&self) -> AppResult<Option<String>> {
        self.prompt_loads.fetch_add(1, Ordering::SeqCst);
        self.system_prompt
            .read()
            .map(|slot| slot.clone())
            .map_err(|_| AppError::internal("system prompt lock poisoned"))
    }
}

#[async_trait]
impl UsageLimiter for MemoryStore {
    async fn check_and_increment(&self, user: &User) -> AppResult<UsageSnapshot> {
        let limit = self.limit_for(&user.id);
        let today = Utc::now().date_naive();
        let mut counter = self.usage.entry(user.id.clone()).or_insert(UsageCounter {
            day: today,
            used: 0,
        });
        if counter.day != today {
            *counter = UsageCounter {
                day: today,
                used: 0,
            };
        }

        if counter.used >= limit {
            return Ok(UsageSnapshot {
                allowed: false,
                queries_used: counter.used,
                queries_limit: limit,
                remaining: 0,
            });
        }

        let remaining = limit - counter.used;
        counter.used += 1;
        Ok(UsageSnapshot {
            allowed: true,
            queries_used: counter.used,
            queries_limit: limit,
            remaining,
        })
    }

    async fn rollback(&self, user_id: &str) -> AppResult<()> {
        if let Some(mut counter) = self.usage.get_mut(user_id) {
            counter.used = (counter.used - 1).max(0);
        }
        Ok(())
    }

    async fn remaining(&self, user: &User) -> AppResult<UsageSnapshot> {
        let limit = self.limit_for(&user.id);
        let used = self.queries_used(&user.id);
        let remaining = (limit - used).max(0);
        Ok(UsageSnapshot {
            allowed: remaining > 0,
            queries_used: used,
            queries_limit: limit,
            remaining,
        })
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_auth_id(&self, auth_user_id: &str) -> AppResult<Option<User>> {
        Ok(self.users.get(auth_user_id).map(|u| u.clone()))
    }
}

// ============================================================================
// MemoryCrm
// ============================================================================

/// Rows served by [`MemoryCrm`]
#[derive(Debug, Clone, Default)]
pub struct CrmFixture {
    /// `(client id, assigned user id)` pairs
    pub assignments: Vec<(String, String)>,
    /// Client names keyed by id
    pub clients: Vec<(String, String)>,
    /// Catalog products with their embedding
    pub products: Vec<(Vec<f32>, ProductMatch)>,
    /// Technical sheet chunks with their embedding
    pub sheets: Vec<(Vec<f32>, TechnicalSheetMatch)>,
    /// Kit inventory keyed by client id
    pub inventory: Vec<(String, InventoryItem)>,
    /// Movements keyed by client id
    pub movements: Vec<(String, Movement)>,
    /// Classifications keyed by client id
    pub classifications: Vec<(String, ProductClassification)>,
    /// ODV sales
    pub odv_sales: Vec<OdvSale>,
    /// Collection events
    pub collections: Vec<Collection>,
    /// General cut statistics
    pub cut_stats: Option<ReportRow>,
    /// Per-doctor cut statistics
    pub cut_stats_by_doctor: Vec<ReportRow>,
    /// Product interest ranking
    pub product_interest: Vec<ReportRow>,
    /// Revenue ranking
    pub sales_ranking: Vec<ProductSales>,
    /// Revenue per brand
    pub brand_performance: Vec<BrandSales>,
    /// Historical data document
    pub historical: Option<Value>,
    /// Billing per doctor
    pub billing: Vec<DoctorBilling>,
    /// Revenue per condition
    pub conditions: Vec<ConditionPerformance>,
    /// Kit impact summary
    pub kit_impact: Option<KitImpact>,
    /// Price list
    pub prices: Vec<ProductPrice>,
}

/// CRM data source answering from a fixture
#[derive(Debug, Default)]
pub struct MemoryCrm {
    fixture: CrmFixture,
    failing: HashSet<&'static str>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn rank_by_similarity<T: Clone>(
    rows: &[(Vec<f32>, T)],
    query: &[f32],
    threshold: f64,
    count: i32,
) -> Vec<T> {
    let mut scored: Vec<(f64, &T)> = rows
        .iter()
        .map(|(embedding, row)| (cosine_similarity(embedding, query), row))
        .filter(|(score, _)| *score >= threshold)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(usize::try_from(count).unwrap_or(0))
        .map(|(_, row)| row.clone())
        .collect()
}

fn take<T>(rows: impl Iterator<Item = T>, limit: i32) -> Vec<T> {
    rows.take(usize::try_from(limit).unwrap_or(0)).collect()
}

impl MemoryCrm {
    /// Serve rows from `fixture`
    #[must_use]
    pub fn new(fixture: CrmFixture) -> Self {
        Self {
            fixture,
            failing: HashSet::new(),
        }
    }

    /// Make the named procedure fail with a database error
    #[must_use]
    pub fn failing(mut self, procedure: &'static str) -> Self {
        self.failing.insert(procedure);
        self
    }

    fn check(&self, procedure: &'static str) -> AppResult<()> {
        if self.failing.contains(procedure) {
            return Err(AppError::database(format!(
                "{procedure} failed: connection reset"
            )));
        }
        Ok(())
    }

    fn visible(&self, client_id: &str, scope: &ClientScope) -> bool {
        scope.user_id().is_none_or(|user_id| {
            self.fixture
                .assignments
                .iter()
                .any(|(client, user)| client == client_id && user == user_id)
        })
    }
}

#[async_trait]
impl CrmDataSource for MemoryCrm {
    async fn client_belongs_to(&self, client_id: &str, user_id: &str) -> AppResult<bool> {
        self.check("clientes")?;
        Ok(self.visible(client_id, &ClientScope::AssignedTo(user_id.to_owned())))
    }

    async fn assigned_client_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        self.check("clientes")?;
        Ok(self
            .fixture
            .assignments
            .iter()
            .filter(|(_, user)| user == user_id)
            .map(|(client, _)| client.clone())
            .collect())
    }

    async fn match_products(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<ProductMatch>> {
        self.check("match_medicamentos")?;
        Ok(rank_by_similarity(
            &self.fixture.products,
            embedding,
            threshold,
            count,
        ))
    }

    async fn match_technical_sheets(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i32,
    ) -> AppResult<Vec<TechnicalSheetMatch>> {
        self.check("match_fichas")?;
        Ok(rank_by_similarity(
            &self.fixture.sheets,
            embedding,
            threshold,
            count,
        ))
    }

    async fn search_clients(
        &self,
        name: &str,
        scope: &ClientScope,
        limit: i32,
    ) -> AppResult<Vec<ClientMatch>> {
        self.check("fuzzy_search_clientes")?;
        let needle = name.to_lowercase();
        let mut matches: Vec<ClientMatch> = self
            .fixture
            .clients
            .iter()
            .filter(|(id, _)| self.visible(id, scope))
            .filter_map(|(id, nombre)| {
                let haystack = nombre.to_lowercase();
                haystack.contains(&needle).then(|| ClientMatch {
                    id_cliente: id.clone(),
                    nombre: nombre.clone(),
                    similarity: needle.len() as f64 / haystack.len().max(1) as f64,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(take(matches.into_iter(), limit))
    }

    async fn doctor_inventory(
        &self,
        client_id: &str,
        scope: &ClientScope,
    ) -> AppResult<Vec<InventoryItem>> {
        self.check("get_inventario_doctor")?;
        if !self.visible(client_id, scope) {
            return Ok(Vec::new());
        }
        Ok(self
            .fixture
            .inventory
            .iter()
            .filter(|(id, _)| id == client_id)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn doctor_movements(
        &self,
        client_id: &str,
        scope: &ClientScope,
        source: MovementSource,
        limit: i32,
    ) -> AppResult<Vec<Movement>> {
        self.check("get_movimientos_doctor")?;
        if !self.visible(client_id, scope) {
            return Ok(Vec::new());
        }
        let rows = self
            .fixture
            .movements
            .iter()
            .filter(|(id, _)| id == client_id)
            .map(|(_, movement)| movement)
            .filter(|m| source == MovementSource::Ambos || m.fuente == source.as_str())
            .cloned();
        Ok(take(rows, limit))
    }

    async fn client_classification(&self, client_id: &str) -> AppResult<Vec<ProductClassification>> {
        self.check("clasificacion_por_cliente")?;
        Ok(self
            .fixture
            .classifications
            .iter()
            .filter(|(id, _)| id == client_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn odv_sales(
        &self,
        scope: &ClientScope,
        sku_filter: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<OdvSale>> {
        self.check("get_ventas_odv_usuario")?;
        let rows = self
            .fixture
            .odv_sales
            .iter()
            .filter(|sale| self.visible(&sale.id_cliente, scope))
            .filter(|sale| sku_filter.is_none_or(|sku| sale.sku == sku))
            .cloned();
        Ok(take(rows, limit))
    }

    async fn collections(
        &self,
        scope: &ClientScope,
        client_id: Option<&str>,
        limit: i32,
    ) -> AppResult<Vec<Collection>> {
        self.check("get_recolecciones_usuario")?;
        let rows = self
            .fixture
            .collections
            .iter()
            .filter(|c| self.visible(&c.id_cliente, scope))
            .filter(|c| client_id.is_none_or(|id| c.id_cliente == id))
            .cloned();
        Ok(take(rows, limit))
    }

    async fn cut_stats(&self) -> AppResult<Option<ReportRow>> {
        self.check("get_corte_stats_generales_con_comparacion")?;
        Ok(self.fixture.cut_stats.clone())
    }

    async fn cut_stats_by_doctor(&self) -> AppResult<Vec<ReportRow>> {
        self.check("get_corte_stats_por_medico_con_comparacion")?;
        Ok(self.fixture.cut_stats_by_doctor.clone())
    }

    async fn product_interest(&self, limit: i32, _range: DateRange) -> AppResult<Vec<ReportRow>> {
        self.check("get_product_interest")?;
        Ok(take(self.fixture.product_interest.iter().cloned(), limit))
    }

    async fn sales_ranking(&self, limit: i32) -> AppResult<Vec<ProductSales>> {
        self.check("get_ranking_ventas_completo")?;
        Ok(take(self.fixture.sales_ranking.iter().cloned(), limit))
    }

    async fn brand_performance(&self) -> AppResult<Vec<BrandSales>> {
        self.check("get_rendimiento_marcas_completo")?;
        Ok(self.fixture.brand_performance.clone())
    }

    async fn historical_data(&self, _range: DateRange) -> AppResult<Option<Value>> {
        self.check("get_corte_historico_data")?;
        Ok(self.fixture.historical.clone())
    }

    async fn billing_composition(&self, _range: DateRange) -> AppResult<Vec<DoctorBilling>> {
        self.check("get_facturacion_composicion")?;
        Ok(self.fixture.billing.clone())
    }

    async fn condition_performance(
        &self,
        _range: DateRange,
    ) -> AppResult<Vec<ConditionPerformance>> {
        self.check("get_padecimiento_performance")?;
        Ok(self.fixture.conditions.clone())
    }

    async fn kit_impact(&self, _range: DateRange) -> AppResult<Option<KitImpact>> {
        self.check("get_impacto_botiquin_resumen")?;
        Ok(self.fixture.kit_impact)
    }

    async fn product_prices(
        &self,
        search: &str,
        brand: Option<&str>,
    ) -> AppResult<Vec<ProductPrice>> {
        self.check("get_precios_medicamentos")?;
        let needle = search.to_lowercase();
        Ok(self
            .fixture
            .prices
            .iter()
            .filter(|p| {
                p.sku.to_lowercase().contains(&needle)
                    || p.descripcion.to_lowercase().contains(&needle)
            })
            .filter(|p| brand.is_none_or(|b| p.marca.as_deref() == Some(b)))
            .cloned()
            .collect())
    }
}
