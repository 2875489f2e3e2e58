//! Composite query model: a path plus an operator over nested conditions.

use serde::{Deserialize, Serialize};

/// One boolean-combinable unit of a composite query.
///
/// The operator is kept as the caller supplied it and resolved only when the
/// nested conditions are evaluated, so an unknown operator on a condition
/// without nested conditions is never reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(alias = "path")]
    pub cps_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<CompositeQuery>,
}

impl CompositeQuery {
    pub fn new(cps_path: impl Into<String>) -> Self {
        Self {
            operator: None,
            cps_path: cps_path.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_condition(mut self, condition: CompositeQuery) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_conditions(mut self, conditions: impl IntoIterator<Item = CompositeQuery>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Levels of nested conditions below this one (0 when there are none).
    pub fn nesting_depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((query, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(query.conditions.iter().map(|c| (c, depth + 1)));
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_nested_document() {
        let json = r#"{
            "cpsPath": "/bookstore",
            "operator": "OR",
            "conditions": [
                { "cpsPath": "//books[@lang='en']" },
                { "path": "//categories", "conditions": [ { "cpsPath": "//books" } ] }
            ]
        }"#;
        let query: CompositeQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.operator.as_deref(), Some("OR"));
        assert_eq!(query.conditions.len(), 2);
        assert_eq!(query.conditions[1].cps_path, "//categories");
        assert_eq!(query.conditions[0].operator, None);
        assert_eq!(query.nesting_depth(), 2);
    }

    #[test]
    fn test_serialize_skips_empty_parts() {
        let query = CompositeQuery::new("/a");
        let json = serde_json::to_string(&query).unwrap();
        assert_eq!(json, r#"{"cpsPath":"/a"}"#);
    }

    #[test]
    fn test_builder() {
        let query = CompositeQuery::new("/a")
            .with_operator("and")
            .with_condition(CompositeQuery::new("//b"))
            .with_conditions([CompositeQuery::new("//c"), CompositeQuery::new("//d")]);
        assert!(query.has_conditions());
        assert_eq!(query.conditions.len(), 3);
        assert_eq!(query.nesting_depth(), 1);
    }
}
