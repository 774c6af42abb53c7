//! Turns indexer entity trees into the name table and per-file reference lists.
//!
//! Two passes, in this order:
//! 1. declarations from every file populate the `NameTable` and the set of
//!    protected USRs,
//! 2. references from every file whose USR is protected become
//!    `ReferenceRecord`s.
//!
//! `ReferenceCollector::into_references` consumes the collector, so no
//! declaration can be added once references have been produced.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::NameTable;
use crate::config::KindConfig;
use crate::error::Result;
use crate::indexer::{self, EntityNode};

/// One occurrence of a protected identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRecord {
    pub file: PathBuf,
    /// 1-indexed.
    pub line: usize,
    /// 1-indexed.
    pub column: usize,
    pub name: String,
    pub identity: String,
}

impl ReferenceRecord {
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

/// References of one file, strictly increasing by (line, column).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReferenceSet {
    records: Vec<ReferenceRecord>,
}

impl FileReferenceSet {
    /// Sort by position and keep the first record seen at each position.
    ///
    /// Indexers may report a symbol twice at the same spot (e.g. as a
    /// read and as a type reference).
    pub fn from_records(mut records: Vec<ReferenceRecord>) -> Self {
        records.sort_by_key(|r| r.position());
        records.dedup_by_key(|r| r.position());
        Self { records }
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Classifies indexer entity kinds.
#[derive(Debug, Clone)]
pub struct KindMatcher {
    declaration_prefix: String,
    declaration_kinds: HashSet<String>,
    reference_prefix: String,
}

impl KindMatcher {
    pub fn from_config(config: &KindConfig) -> Self {
        Self {
            declaration_prefix: config.declaration_prefix.clone(),
            declaration_kinds: config.declaration_kinds.iter().cloned().collect(),
            reference_prefix: config.reference_prefix.clone(),
        }
    }

    pub fn is_declaration(&self, kind: &str) -> bool {
        kind.strip_prefix(&self.declaration_prefix)
            .is_some_and(|suffix| self.declaration_kinds.contains(suffix))
    }

    /// Declarations count as references too: the defining occurrence has to
    /// be rewritten like any other.
    pub fn is_reference(&self, kind: &str) -> bool {
        kind.starts_with(&self.reference_prefix) || self.is_declaration(kind)
    }
}

/// `foo(bar:baz:)` → `foo`. Method names come back with their labels, but
/// only the base name appears as a token in source.
fn base_name(name: &str) -> &str {
    name.split('(').next().unwrap_or(name).trim()
}

struct IndexedFile {
    file: PathBuf,
    entities: Vec<EntityNode>,
}

pub struct ReferenceCollector {
    kinds: KindMatcher,
    protected: HashSet<String>,
    indexed: Vec<IndexedFile>,
}

/// Output of the reference pass.
#[derive(Debug, Default)]
pub struct CollectedReferences {
    pub by_file: BTreeMap<PathBuf, FileReferenceSet>,
    /// Reference nodes without a usable name, identity or position.
    pub dropped: usize,
}

impl CollectedReferences {
    pub fn total(&self) -> usize {
        self.by_file.values().map(FileReferenceSet::len).sum()
    }
}

impl ReferenceCollector {
    pub fn new(kinds: KindMatcher) -> Self {
        Self {
            kinds,
            protected: HashSet::new(),
            indexed: Vec::new(),
        }
    }

    /// Declaration pass for one file. Returns the number of declarations found.
    pub fn collect_declarations(
        &mut self,
        file: PathBuf,
        entities: Vec<EntityNode>,
        table: &mut NameTable,
    ) -> Result<usize> {
        let mut found = 0;
        let mut failure = None;
        let kinds = &self.kinds;
        let protected = &mut self.protected;

        indexer::visit(&entities, &mut |node: &EntityNode| {
            if failure.is_some() || !kinds.is_declaration(&node.kind) {
                return;
            }
            let (Some(name), Some(identity)) = (node.name.as_deref(), node.identity.as_deref())
            else {
                return;
            };
            let name = base_name(name);
            if name.is_empty() {
                return;
            }
            let generated = match table.resolve(name) {
                Ok(generated) => generated,
                Err(err) => {
                    failure = Some(err);
                    return;
                }
            };
            protected.insert(identity.to_string());
            found += 1;
            log_status!(
                "index",
                "Found declaration of {} ({}) -> now {}",
                name,
                identity,
                generated
            );
        });

        if let Some(err) = failure {
            return Err(err);
        }

        self.indexed.push(IndexedFile { file, entities });
        Ok(found)
    }

    pub fn is_protected(&self, identity: &str) -> bool {
        self.protected.contains(identity)
    }

    /// Reference pass over every indexed file.
    pub fn into_references(self) -> CollectedReferences {
        let mut collected = CollectedReferences::default();

        for indexed in &self.indexed {
            let mut records = Vec::new();

            indexer::visit(&indexed.entities, &mut |node: &EntityNode| {
                if !self.kinds.is_reference(&node.kind) {
                    return;
                }
                let (Some(identity), Some((line, column)), Some(name)) =
                    (node.identity.as_deref(), node.position(), node.name.as_deref())
                else {
                    collected.dropped += 1;
                    return;
                };
                if !self.protected.contains(identity) {
                    return;
                }
                records.push(ReferenceRecord {
                    file: indexed.file.clone(),
                    line,
                    column,
                    name: base_name(name).to_string(),
                    identity: identity.to_string(),
                });
            });

            if records.is_empty() {
                continue;
            }
            log_status!(
                "index",
                "Found {} references in {}",
                records.len(),
                indexed.file.display()
            );
            collected
                .by_file
                .entry(indexed.file.clone())
                .or_default()
                .records
                .extend(records);
        }

        for set in collected.by_file.values_mut() {
            let records = std::mem::take(&mut set.records);
            *set = FileReferenceSet::from_records(records);
        }

        collected
    }
}

#[cfg(test)]
mod tests {
    use super::super::name_table::testing::SequenceGenerator;
    use super::*;
    use crate::config::ShieldConfig;

    fn node(kind: &str, name: &str, usr: &str, line: usize, column: usize) -> EntityNode {
        EntityNode {
            kind: kind.to_string(),
            name: Some(name.to_string()),
            identity: Some(usr.to_string()),
            line: Some(line),
            column: Some(column),
            children: Vec::new(),
        }
    }

    fn collector() -> ReferenceCollector {
        ReferenceCollector::new(KindMatcher::from_config(&ShieldConfig::default().kinds))
    }

    fn table() -> NameTable {
        NameTable::with_generator(25, Box::new(SequenceGenerator::default()))
    }

    #[test]
    fn kind_matcher_recognizes_configured_kinds() {
        let kinds = KindMatcher::from_config(&ShieldConfig::default().kinds);
        assert!(kinds.is_declaration("source.lang.swift.decl.class"));
        assert!(kinds.is_declaration("source.lang.swift.decl.function.method.instance"));
        assert!(!kinds.is_declaration("source.lang.swift.decl.var.instance"));
        assert!(kinds.is_reference("source.lang.swift.ref.struct"));
        assert!(kinds.is_reference("source.lang.swift.decl.struct"));
        assert!(!kinds.is_reference("source.lang.swift.import.module.swift"));
    }

    #[test]
    fn declarations_populate_table_and_strip_labels() {
        let mut table = table();
        let mut collector = collector();
        let mut class = node("source.lang.swift.decl.class", "Foo", "s:Foo", 1, 7);
        class.children.push(node(
            "source.lang.swift.decl.function.method.instance",
            "run(with:)",
            "s:Foo.run",
            2,
            10,
        ));

        let found = collector
            .collect_declarations(PathBuf::from("/a.swift"), vec![class], &mut table)
            .unwrap();

        assert_eq!(found, 2);
        assert!(table.contains("Foo"));
        assert!(table.contains("run"));
        assert!(collector.is_protected("s:Foo.run"));
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        let mut table = table();
        let mut collector = collector();
        let var = node("source.lang.swift.decl.var.global", "count", "s:count", 1, 5);
        collector
            .collect_declarations(PathBuf::from("/a.swift"), vec![var], &mut table)
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn cross_file_references_are_found() {
        let mut table = table();
        let mut collector = collector();
        let decl = node("source.lang.swift.decl.class", "Foo", "s:Foo", 1, 7);
        let use_site = node("source.lang.swift.ref.class", "Foo", "s:Foo", 3, 12);
        let stdlib = node("source.lang.swift.ref.struct", "String", "s:SS", 3, 20);

        collector
            .collect_declarations(PathBuf::from("/b.swift"), vec![use_site, stdlib], &mut table)
            .unwrap();
        collector
            .collect_declarations(PathBuf::from("/a.swift"), vec![decl], &mut table)
            .unwrap();
        let collected = collector.into_references();

        assert_eq!(collected.total(), 2);
        let b = &collected.by_file[&PathBuf::from("/b.swift")];
        assert_eq!(b.len(), 1);
        assert_eq!(b.records()[0].position(), (3, 12));
        assert_eq!(b.records()[0].name, "Foo");
    }

    #[test]
    fn duplicate_positions_collapse_to_first() {
        let mut table = table();
        let mut collector = collector();
        let decl = node("source.lang.swift.decl.struct", "Point", "s:Point", 1, 8);
        let first = node("source.lang.swift.ref.struct", "Point", "s:Point", 4, 3);
        let mut second = node("source.lang.swift.ref.struct", "Point", "s:Point", 4, 3);
        second.kind = "source.lang.swift.ref.var.instance".to_string();

        collector
            .collect_declarations(PathBuf::from("/a.swift"), vec![decl, first, second], &mut table)
            .unwrap();
        let collected = collector.into_references();
        let records = collected.by_file[&PathBuf::from("/a.swift")].records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].position(), (4, 3));
    }

    #[test]
    fn records_are_sorted_by_line_then_column() {
        let records = vec![
            ReferenceRecord {
                file: PathBuf::from("/a"),
                line: 3,
                column: 1,
                name: "A".to_string(),
                identity: "a".to_string(),
            },
            ReferenceRecord {
                file: PathBuf::from("/a"),
                line: 1,
                column: 9,
                name: "A".to_string(),
                identity: "a".to_string(),
            },
            ReferenceRecord {
                file: PathBuf::from("/a"),
                line: 1,
                column: 2,
                name: "A".to_string(),
                identity: "a".to_string(),
            },
        ];
        let set = FileReferenceSet::from_records(records);
        let positions: Vec<(usize, usize)> = set.records().iter().map(|r| r.position()).collect();
        assert_eq!(positions, vec![(1, 2), (1, 9), (3, 1)]);
    }

    #[test]
    fn malformed_reference_nodes_are_dropped() {
        let mut table = table();
        let mut collector = collector();
        let decl = node("source.lang.swift.decl.class", "Foo", "s:Foo", 1, 7);
        let mut no_position = node("source.lang.swift.ref.class", "Foo", "s:Foo", 0, 0);
        no_position.line = None;
        let mut no_usr = node("source.lang.swift.ref.class", "Foo", "s:Foo", 2, 1);
        no_usr.identity = None;

        collector
            .collect_declarations(
                PathBuf::from("/a.swift"),
                vec![decl, no_position, no_usr],
                &mut table,
            )
            .unwrap();
        let collected = collector.into_references();

        assert_eq!(collected.dropped, 2);
        assert_eq!(collected.total(), 1);
    }
}
