use crate::error::GuardResult;
use crate::graph::{NodeId, StoredNode};
use crate::inventory::Inventory;
use crate::schema::{NodeKind, Platform};
use crate::store::GraphStore;
use std::collections::HashMap;

struct Export {
    nodes: Vec<StoredNode>,
    ids: HashMap<NodeId, String>,
    edges: Vec<(String, &'static str, String)>,
}

fn collect<S: GraphStore>(inventory: &Inventory<S>) -> GuardResult<Export> {
    let mut nodes = Vec::new();
    for kind in NodeKind::ALL {
        nodes.extend(inventory.nodes_of_kind(kind)?);
    }
    let ids: HashMap<NodeId, String> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id, format!("n{}", i)))
        .collect();

    let edges = inventory
        .edges()?
        .into_iter()
        .filter_map(|edge| {
            let source = ids.get(&edge.source)?;
            let target = ids.get(&edge.target)?;
            Some((source.clone(), edge.relation.label(), target.clone()))
        })
        .collect();

    Ok(Export { nodes, ids, edges })
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "'").replace('\n', " ")
}

fn fill_color(node: &StoredNode) -> &'static str {
    if !node.findings.is_empty() {
        return "#ef4444";
    }
    match node.kind.platform() {
        Platform::Jenkins => "#f59e0b",
        Platform::GitHub => "#3b82f6",
        Platform::Jfrog => "#22c55e",
    }
}

fn label(node: &StoredNode) -> String {
    let mut label = format!("{}\\n{}", node.kind.technology(), escape(node.display_name()));
    if !node.findings.is_empty() {
        label.push_str(&format!("\\n{} finding(s)", node.findings.len()));
    }
    label
}

/// Mermaid flowchart of the inventory. Nodes with findings are red.
pub fn to_mermaid<S: GraphStore>(inventory: &Inventory<S>) -> GuardResult<String> {
    let export = collect(inventory)?;
    let mut lines = vec!["graph LR".to_string()];

    for node in &export.nodes {
        lines.push(format!("    {}[\"{}\"]", export.ids[&node.id], label(node)));
    }
    for (source, relation, target) in &export.edges {
        lines.push(format!("    {} -->|{}| {}", source, relation, target));
    }

    let flagged: Vec<&str> = export
        .nodes
        .iter()
        .filter(|n| !n.findings.is_empty())
        .map(|n| export.ids[&n.id].as_str())
        .collect();
    if !flagged.is_empty() {
        lines.push(format!("    style {} fill:#ef4444,color:#fff", flagged.join(",")));
    }

    Ok(lines.join("\n"))
}

/// Graphviz DOT rendering of the inventory.
pub fn to_dot<S: GraphStore>(inventory: &Inventory<S>) -> GuardResult<String> {
    let export = collect(inventory)?;
    let mut lines = vec![
        "digraph \"cicdguard\" {".to_string(),
        "    rankdir=LR;".to_string(),
        "    node [shape=box, style=\"rounded,filled\", fontname=\"Helvetica\"];".to_string(),
        "    edge [color=\"#666666\", fontsize=10];".to_string(),
        String::new(),
    ];

    for node in &export.nodes {
        lines.push(format!(
            "    {} [label=\"{}\", fillcolor=\"{}\", fontcolor=\"#ffffff\"];",
            export.ids[&node.id],
            label(node),
            fill_color(node)
        ));
    }
    lines.push(String::new());
    for (source, relation, target) in &export.edges {
        lines.push(format!("    {} -> {} [label=\"{}\"];", source, target, relation));
    }
    lines.push("}".to_string());

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::test_support::inventory;
    use crate::schema::{GithubOrganization, GithubRepository, Relation};

    fn sample() -> Inventory<crate::store::MemoryStore> {
        let mut inv = inventory();
        let org = inv
            .upsert_record(&GithubOrganization { name: "acme".into(), two_factor_enabled: true })
            .unwrap();
        let repo = inv
            .upsert_record(&GithubRepository { name: "api".into(), ..Default::default() })
            .unwrap();
        inv.connect(org, Relation::PartOf, repo).unwrap();
        inv.record(org, "SIA016", "api: default_workflow_permissions=write").unwrap();
        inv
    }

    #[test]
    fn test_mermaid_export() {
        let mermaid = to_mermaid(&sample()).unwrap();
        assert!(mermaid.starts_with("graph LR"));
        assert!(mermaid.contains("n0 -->|PART_OF| n1"));
        assert!(mermaid.contains("style n0 fill:#ef4444"));
    }

    #[test]
    fn test_dot_export() {
        let dot = to_dot(&sample()).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("n0 -> n1 [label=\"PART_OF\"]"));
        assert!(dot.contains("1 finding(s)"));
        assert!(dot.ends_with('}'));
    }
}
