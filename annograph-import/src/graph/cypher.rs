//! Cypher rendering of schema statements and discourse batches

use super::{AnchorNode, GraphBatch, SchemaStatement, SpanEdge, TypeKey, TypeNode, ANCHOR_LABEL};
use std::collections::BTreeMap;

impl SchemaStatement {
    pub fn to_cypher(&self) -> String {
        match self {
            SchemaStatement::CreateIndex { label, property } => {
                format!("CREATE INDEX ON :{}({});", quote_name(label), quote_name(property))
            }
            SchemaStatement::CreateUniqueConstraint { label, property } => format!(
                "CREATE CONSTRAINT ON (node:{}) ASSERT node.{} IS UNIQUE;",
                quote_name(label),
                quote_name(property)
            ),
            SchemaStatement::DropUniqueConstraint { label, property } => format!(
                "DROP CONSTRAINT ON (node:{}) ASSERT node.{} IS UNIQUE;",
                quote_name(label),
                quote_name(property)
            ),
        }
    }
}

impl GraphBatch {
    /// One statement per line: type merges, anchors, spans, then hierarchy links
    pub fn to_cypher(&self) -> String {
        let mut cypher = String::new();

        for node in &self.types {
            cypher.push_str(&format!(
                "MERGE (t:{}:{} {});\n",
                quote_name(&type_label(&node.key)),
                quote_name(&self.corpus),
                type_pattern(node)
            ));
        }

        for anchor in &self.anchors {
            cypher.push_str(&format!(
                "CREATE (:{}:{}:{} {{id: '{}', time: {}, label: '{}'}});\n",
                ANCHOR_LABEL,
                quote_name(&self.corpus),
                quote_name(&self.discourse),
                anchor_id(&self.discourse, anchor.id),
                anchor.key.as_f64(),
                escape_cypher_string(&anchor.label)
            ));
        }

        let types: BTreeMap<&TypeKey, &TypeNode> = self.types.iter().map(|t| (&t.key, t)).collect();
        for span in &self.spans {
            cypher.push_str(&self.span_statement(span, types.get(&span.type_key).copied()));
        }

        let annotation_types: BTreeMap<_, _> = self
            .spans
            .iter()
            .map(|s| (s.id, s.annotation_type.as_str()))
            .collect();
        for span in &self.spans {
            let Some(parent) = span.parent else {
                continue;
            };
            let Some(parent_type) = annotation_types.get(&parent) else {
                continue;
            };
            cypher.push_str(&format!(
                "MATCH (c:{} {{id: '{}'}}), (p:{} {{id: '{}'}}) CREATE (c)-[:contained_by]->(p);\n",
                quote_name(&span.annotation_type),
                span.id,
                quote_name(parent_type),
                parent
            ));
        }

        cypher
    }

    fn span_statement(&self, span: &SpanEdge, type_node: Option<&TypeNode>) -> String {
        let relation = quote_name(&format!("r_{}", span.annotation_type));
        let mut props = BTreeMap::new();
        props.insert("label".to_string(), serde_json::Value::String(span.label.clone()));
        props.extend(span.properties.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut statement = format!(
            "MATCH (b:{} {{id: '{}'}}), (e:{} {{id: '{}'}})",
            ANCHOR_LABEL,
            anchor_id(&self.discourse, span.begin),
            ANCHOR_LABEL,
            anchor_id(&self.discourse, span.end),
        );
        if let Some(node) = type_node {
            statement.push_str(&format!(
                ", (t:{}:{} {})",
                quote_name(&type_label(&node.key)),
                quote_name(&self.corpus),
                type_pattern(node)
            ));
        }
        statement.push_str(&format!(
            " CREATE (n:{}:{}:{} {{id: '{}'{}}}), (b)-[:{}]->(n), (n)-[:{}]->(e)",
            quote_name(&span.annotation_type),
            quote_name(&self.corpus),
            quote_name(&self.discourse),
            span.id,
            format_cypher_props(&props),
            relation,
            relation
        ));
        if type_node.is_some() {
            statement.push_str(", (n)-[:is_a]->(t)");
        }
        statement.push_str(";\n");
        statement
    }
}

/// Remove every node of one discourse
pub fn remove_discourse_statement(corpus: &str, discourse: &str) -> String {
    format!(
        "MATCH (n:{}:{}) DETACH DELETE n;",
        quote_name(corpus),
        quote_name(discourse)
    )
}

/// Remove every node of a corpus
pub fn reset_corpus_statement(corpus: &str) -> String {
    format!("MATCH (n:{}) DETACH DELETE n;", quote_name(corpus))
}

fn anchor_id(discourse: &str, id: u64) -> String {
    escape_cypher_string(&format!("{}_{}", discourse, id))
}

fn type_label(key: &TypeKey) -> String {
    format!("{}_type", key.annotation_type)
}

fn type_pattern(node: &TypeNode) -> String {
    let mut props = BTreeMap::new();
    props.insert("label".to_string(), serde_json::Value::String(node.key.label.clone()));
    props.extend(node.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
    let rendered = format_cypher_props(&props);
    format!("{{{}}}", rendered.trim_start_matches(", "))
}

/// `, key: value` pairs; nulls and nested objects are skipped
fn format_cypher_props(props: &BTreeMap<String, serde_json::Value>) -> String {
    let mut parts = Vec::new();
    for (key, value) in props {
        let formatted = match value {
            serde_json::Value::String(s) => format!("{}: '{}'", quote_name(key), escape_cypher_string(s)),
            serde_json::Value::Number(n) => format!("{}: {}", quote_name(key), n),
            serde_json::Value::Bool(b) => format!("{}: {}", quote_name(key), b),
            serde_json::Value::Array(_) => format!("{}: {}", quote_name(key), value),
            _ => continue,
        };
        parts.push(formatted);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(", {}", parts.join(", "))
    }
}

fn escape_cypher_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Backtick-quote a label or property name
fn quote_name(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AnchorKey, WORD_TYPE};
    use uuid::Uuid;

    #[test]
    fn test_schema_statement_cypher() {
        let create = SchemaStatement::CreateUniqueConstraint {
            label: "word".to_string(),
            property: "id".to_string(),
        };
        assert_eq!(
            create.to_cypher(),
            "CREATE CONSTRAINT ON (node:`word`) ASSERT node.`id` IS UNIQUE;"
        );
        let index = SchemaStatement::CreateIndex {
            label: "Anchor".to_string(),
            property: "time".to_string(),
        };
        assert_eq!(index.to_cypher(), "CREATE INDEX ON :`Anchor`(`time`);");
    }

    #[test]
    fn test_batch_cypher_links_span_to_type_and_anchors() {
        let type_node = TypeNode::new(WORD_TYPE, "it's", BTreeMap::new());
        let span = SpanEdge {
            id: Uuid::new_v4(),
            annotation_type: WORD_TYPE.to_string(),
            label: "it's".to_string(),
            begin: 0,
            end: 1,
            properties: BTreeMap::new(),
            type_key: type_node.key.clone(),
            parent: None,
        };
        let batch = GraphBatch {
            corpus: "my corpus".to_string(),
            discourse: "d1".to_string(),
            anchors: vec![
                AnchorNode { id: 0, key: AnchorKey::Index(0), label: "k".to_string() },
                AnchorNode { id: 1, key: AnchorKey::Index(1), label: String::new() },
            ],
            spans: vec![span.clone()],
            types: vec![type_node],
            ..Default::default()
        };

        let script = batch.to_cypher();
        assert_eq!(script.lines().count(), 4);
        assert!(script.contains("MERGE (t:`word_type`:`my corpus` {`label`: 'it\\'s'});"));
        assert!(script.contains("id: 'd1_0', time: 0"));
        assert!(script.contains(&format!("id: '{}'", span.id)));
        assert!(script.contains("(n)-[:is_a]->(t)"));
    }

    #[test]
    fn test_removal_statements() {
        assert_eq!(
            remove_discourse_statement("c", "d"),
            "MATCH (n:`c`:`d`) DETACH DELETE n;"
        );
        assert_eq!(reset_corpus_statement("c"), "MATCH (n:`c`) DETACH DELETE n;");
    }
}
