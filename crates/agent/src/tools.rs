//! Read-only tools the AI Director may invoke while deciding. Each tool is
//! a pure read against external data; nothing here writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use cartly_core::config::DeliveryConfig;
use cartly_core::domain::product::ProductId;
use cartly_core::ports::{OrderStore, ProductLookup};

use crate::llm::ToolSpec;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    Unknown(String),
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("tool lookup failed: {0}")]
    Lookup(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.execute(input).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn required_str(input: &Value, key: &str) -> Result<String, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing string field `{key}`")))
}

pub struct StockLookupTool {
    products: Arc<dyn ProductLookup>,
}

impl StockLookupTool {
    pub fn new(products: Arc<dyn ProductLookup>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl Tool for StockLookupTool {
    fn name(&self) -> &'static str {
        "stock_lookup"
    }

    fn description(&self) -> &'static str {
        "Look up a product by id and report its price, stock, and variants."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "product_id": { "type": "string", "description": "Catalog product id" }
            },
            "required": ["product_id"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let product_id = required_str(&input, "product_id")?;
        let product = self
            .products
            .find(&ProductId(product_id.clone()))
            .await
            .map_err(|error| ToolError::Lookup(error.to_string()))?;

        match product {
            None => Ok(json!({ "found": false, "product_id": product_id })),
            Some(product) => Ok(json!({
                "found": true,
                "product_id": product.id.0,
                "name": product.name,
                "unit_price": product.unit_price.to_string(),
                "stock": product.stock,
                "variants": product
                    .variants
                    .iter()
                    .map(|variant| json!({
                        "name": variant.name,
                        "stock": variant.stock,
                        "unit_price": variant.unit_price.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            })),
        }
    }
}

pub struct OrderStatusTool {
    orders: Arc<dyn OrderStore>,
}

impl OrderStatusTool {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &'static str {
        "order_status"
    }

    fn description(&self) -> &'static str {
        "Find the latest order for a customer phone number and report its status."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "phone": { "type": "string", "description": "Customer phone number" }
            },
            "required": ["phone"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let phone = required_str(&input, "phone")?;
        let order = self
            .orders
            .find_latest_by_phone(&phone)
            .await
            .map_err(|error| ToolError::Lookup(error.to_string()))?;

        match order {
            None => Ok(json!({ "found": false })),
            Some(order) => Ok(json!({
                "found": true,
                "order_id": order.id.0,
                "status": format!("{:?}", order.status).to_ascii_lowercase(),
                "total": order.total.to_string(),
                "placed_at": order.placed_at.to_rfc3339(),
            })),
        }
    }
}

pub struct DeliveryFeeTool {
    delivery: DeliveryConfig,
}

impl DeliveryFeeTool {
    pub fn new(delivery: DeliveryConfig) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl Tool for DeliveryFeeTool {
    fn name(&self) -> &'static str {
        "delivery_fee"
    }

    fn description(&self) -> &'static str {
        "Calculate the delivery fee for a destination address."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": { "type": "string", "description": "Destination address" }
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let address = required_str(&input, "address")?;
        let fee_cents = self.delivery.fee_cents_for(&address);
        Ok(json!({ "fee_cents": fee_cents }))
    }
}
