use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use cartly_core::domain::conversation::{ConversationContext, ConversationId};
use cartly_core::domain::order::{OrderDraft, OrderId, OrderStatus, OrderSummary};
use cartly_core::domain::product::{ProductId, ProductSummary};
use cartly_core::ports::{
    ConversationStore, ConversationTurn, OrderStore, ProductLookup, StorageFailure,
};

#[derive(Default)]
pub struct InMemoryConversationStore {
    contexts: RwLock<HashMap<String, ConversationContext>>,
    turns: RwLock<HashMap<String, Vec<ConversationTurn>>>,
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, StorageFailure> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(&id.0).cloned())
    }

    async fn save(
        &self,
        id: &ConversationId,
        context: &ConversationContext,
    ) -> Result<(), StorageFailure> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(id.0.clone(), context.clone());
        Ok(())
    }

    async fn append_turn(
        &self,
        id: &ConversationId,
        turn: ConversationTurn,
    ) -> Result<(), StorageFailure> {
        let mut turns = self.turns.write().await;
        turns.entry(id.0.clone()).or_default().push(turn);
        Ok(())
    }

    async fn recent_turns(
        &self,
        id: &ConversationId,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, StorageFailure> {
        let turns = self.turns.read().await;
        let all = turns.get(&id.0).cloned().unwrap_or_default();
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all.into_iter().skip(skip).collect())
    }
}

pub struct InMemoryProductLookup {
    products: Vec<ProductSummary>,
}

impl InMemoryProductLookup {
    pub fn with_products(products: Vec<ProductSummary>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl ProductLookup for InMemoryProductLookup {
    async fn search(&self, query: &str) -> Result<Vec<ProductSummary>, StorageFailure> {
        let needle = query.trim().to_ascii_lowercase();
        Ok(self
            .products
            .iter()
            .filter(|product| product.active)
            .filter(|product| {
                needle.is_empty() || product.name.to_ascii_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn find(&self, id: &ProductId) -> Result<Option<ProductSummary>, StorageFailure> {
        Ok(self.products.iter().find(|product| product.id == *id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<Vec<(OrderDraft, OrderSummary)>>,
}

impl InMemoryOrderStore {
    pub async fn created_orders(&self) -> Vec<OrderDraft> {
        let orders = self.orders.read().await;
        orders.iter().map(|(draft, _)| draft.clone()).collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, draft: OrderDraft) -> Result<OrderId, StorageFailure> {
        let id = OrderId(format!("ORD-{}", Uuid::new_v4()));
        let summary = OrderSummary {
            id: id.clone(),
            status: OrderStatus::Pending,
            total: draft.total(),
            placed_at: Utc::now(),
        };
        let mut orders = self.orders.write().await;
        orders.push((draft, summary));
        Ok(id)
    }

    async fn find_latest_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<OrderSummary>, StorageFailure> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .rev()
            .find(|(draft, _)| draft.phone == phone)
            .map(|(_, summary)| summary.clone()))
    }
}
