use super::load_manifests;
use anyhow::{bail, Result};
use rctl_schemas::{Kind, Object, ResourceKey};
use std::collections::{BTreeMap, BTreeSet};

/// Problems found in a set of manifests. Empty means valid.
pub fn check(objects: &[Object]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut declared = BTreeSet::new();
    for obj in objects {
        let key = obj.key();
        if !declared.insert(key.clone()) {
            problems.push(format!("duplicate object {key}"));
        }
    }

    let mut graph: BTreeMap<ResourceKey, Vec<ResourceKey>> = BTreeMap::new();
    for obj in objects {
        let key = obj.key();
        let ns = &key.namespace;
        let edges = graph.entry(key.clone()).or_default();
        if let Some(host) = obj.host_name() {
            if !declared.contains(&ResourceKey::new(ns, host, Kind::Host)) {
                problems.push(format!("{key}: host '{host}' is not declared"));
            }
        }
        for req in obj.requires().into_iter().flatten() {
            let target = ResourceKey::new(ns, req.name(), req.kind());
            if target == key {
                problems.push(format!("{key}: requires itself"));
            } else if !declared.contains(&target) {
                problems.push(format!("{key}: requires {req}, which is not declared"));
            } else {
                edges.push(target);
            }
        }
        if let Some(source) = content_source(obj) {
            let target = ResourceKey::new(ns, source, Kind::FileContent);
            if !declared.contains(&target) {
                problems.push(format!(
                    "{key}: content source filecontent '{source}' is not declared"
                ));
            } else {
                edges.push(target);
            }
        }
    }

    for cycle in find_cycles(&graph) {
        let path: Vec<String> = cycle
            .iter()
            .chain(cycle.first())
            .map(ToString::to_string)
            .collect();
        problems.push(format!("dependency cycle: {}", path.join(" -> ")));
    }
    problems
}

/// Name of the FileContent a File copies its content from.
fn content_source(obj: &Object) -> Option<&str> {
    match obj {
        Object::File(f) if f.spec.content.is_none() => f
            .spec
            .source
            .as_ref()
            .and_then(|s| s.file_content.as_ref())
            .map(|r| r.name.as_str()),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Finished,
}

/// Every cycle reachable by depth-first search, each reported once.
fn find_cycles(graph: &BTreeMap<ResourceKey, Vec<ResourceKey>>) -> Vec<Vec<ResourceKey>> {
    let mut marks = BTreeMap::new();
    let mut path = Vec::new();
    let mut cycles = Vec::new();
    for start in graph.keys() {
        visit(start, graph, &mut marks, &mut path, &mut cycles);
    }
    cycles
}

fn visit(
    node: &ResourceKey,
    graph: &BTreeMap<ResourceKey, Vec<ResourceKey>>,
    marks: &mut BTreeMap<ResourceKey, Mark>,
    path: &mut Vec<ResourceKey>,
    cycles: &mut Vec<Vec<ResourceKey>>,
) {
    match marks.get(node) {
        Some(Mark::Finished) => return,
        Some(Mark::OnPath) => {
            if let Some(pos) = path.iter().position(|k| k == node) {
                cycles.push(path[pos..].to_vec());
            }
            return;
        }
        None => {}
    }
    marks.insert(node.clone(), Mark::OnPath);
    path.push(node.clone());
    for next in graph.get(node).into_iter().flatten() {
        visit(next, graph, marks, path, cycles);
    }
    path.pop();
    marks.insert(node.clone(), Mark::Finished);
}

pub fn run(files: &[String]) -> Result<()> {
    let objects = load_manifests(files)?;

    let mut per_kind: BTreeMap<Kind, usize> = BTreeMap::new();
    for obj in &objects {
        *per_kind.entry(obj.kind()).or_insert(0) += 1;
    }
    println!("objects={}", objects.len());
    for kind in Kind::ALL {
        println!("{}={}", kind.as_str().to_lowercase(), per_kind.get(&kind).unwrap_or(&0));
    }

    let problems = check(&objects);
    for p in &problems {
        println!("problem: {p}");
    }
    if !problems.is_empty() {
        bail!("INVALID_MANIFEST: {} problem(s)", problems.len());
    }
    println!("valid=true");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rctl_schemas::parse_manifest_yaml;

    #[test]
    fn dangling_references_are_reported() {
        let objects = parse_manifest_yaml(
            r#"
kind: Command
metadata: { name: c1 }
spec:
  host: h1
  command: "true"
  requires:
    - file: { name: f-missing }
    - command: { name: c1 }
"#,
        )
        .unwrap();
        let problems = check(&objects);
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems[0].contains("host 'h1'"));
        assert!(problems[1].contains("File/f-missing"));
        assert!(problems[2].contains("requires itself"));
    }

    #[test]
    fn undeclared_content_source_is_reported() {
        let objects = parse_manifest_yaml(
            r#"
kind: Host
metadata: { name: h1 }
spec: { sshkeysecret: k, ipaddress: 10.0.0.1 }
---
kind: File
metadata: { name: copy }
spec:
  host: h1
  path: /etc/copy
  source: { filecontent: { name: ghost } }
"#,
        )
        .unwrap();
        let problems = check(&objects);
        assert_eq!(
            problems,
            vec!["File/default/copy: content source filecontent 'ghost' is not declared"]
        );
    }

    #[test]
    fn longer_cycles_are_reported_once() {
        let objects = parse_manifest_yaml(
            r#"
kind: Host
metadata: { name: h1 }
spec: { sshkeysecret: k, ipaddress: 10.0.0.1 }
---
kind: Command
metadata: { name: a }
spec: { host: h1, command: "true", requires: [ { command: { name: b } } ] }
---
kind: Command
metadata: { name: b }
spec: { host: h1, command: "true", requires: [ { file: { name: f } } ] }
---
kind: File
metadata: { name: f }
spec: { host: h1, path: /f, content: "", requires: [ { command: { name: a } } ] }
---
kind: Command
metadata: { name: ok }
spec: { host: h1, command: "true", requires: [ { command: { name: a } } ] }
"#,
        )
        .unwrap();
        let problems = check(&objects);
        assert_eq!(problems.len(), 1, "{problems:?}");
        assert_eq!(
            problems[0],
            "dependency cycle: Command/default/a -> Command/default/b -> File/default/f -> Command/default/a"
        );
    }

    #[test]
    fn content_source_counts_as_an_edge() {
        let objects = parse_manifest_yaml(
            r#"
kind: Host
metadata: { name: h1 }
spec: { sshkeysecret: k, ipaddress: 10.0.0.1 }
---
kind: FileContent
metadata: { name: src }
spec: { host: h1, path: /src, requires: [ { file: { name: dst } } ] }
---
kind: File
metadata: { name: dst }
spec: { host: h1, path: /dst, source: { filecontent: { name: src } } }
"#,
        )
        .unwrap();
        let problems = check(&objects);
        assert_eq!(problems.len(), 1, "{problems:?}");
        assert!(problems[0].starts_with("dependency cycle: "), "{problems:?}");
    }
}
