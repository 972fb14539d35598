use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Argument names mapped to a short type/meaning hint.
    fn parameters(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Catalog handed to the model: one entry per tool, sorted by name.
    pub fn describe(&self) -> Value {
        Value::Array(
            self.tools
                .values()
                .map(|tool| {
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    })
                })
                .collect(),
        )
    }

    pub async fn call(&self, name: &str, input: Value) -> Result<Value> {
        let tool = self.tools.get(name).ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        tool.execute(input).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{Tool, ToolRegistry};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Returns its input."
        }

        fn parameters(&self) -> Value {
            json!({ "value": "any" })
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn registered_tools_are_described_and_callable() {
        let mut registry = ToolRegistry::default();
        registry.register(Echo);

        assert_eq!(registry.names(), vec!["echo"]);
        assert_eq!(registry.describe()[0]["description"], "Returns its input.");
        let echoed = registry.call("echo", json!({"value": 3})).await.expect("echo");
        assert_eq!(echoed, json!({"value": 3}));

        let missing = registry.call("nope", json!({})).await.expect_err("unknown tool");
        assert_eq!(missing.to_string(), "unknown tool `nope`");
    }
}
