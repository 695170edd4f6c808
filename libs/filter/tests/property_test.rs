//! Property-based tests using QuickCheck

use quickcheck::{Arbitrary, Gen, QuickCheck, TestResult};
use tagql_filter::{compile_filter, CompileOptions, FilterCompiler, FilterQuery, ValueColumns};

const NAMES: &[&str] = &["site", "equip", "dis", "area", "siteRef", "equipRef", "yearBuilt"];
const VALUES: &[&str] = &["1986", "-2.5", "@17", "\"Zone B\"", "true", "2020-01-31", "08:30", "`urn:x`"];
const OPS: &[&str] = &["==", "!=", "<", "<=", ">", ">="];

/// A well-formed filter string plus the number of tag references it contains
#[derive(Debug, Clone)]
struct GeneratedFilter {
    text: String,
    references: usize,
}

fn pick<'a>(g: &mut Gen, items: &'a [&'a str]) -> &'a str {
    g.choose(items).copied().unwrap_or(items[0])
}

fn path(g: &mut Gen) -> (String, usize) {
    let segments = 1 + usize::arbitrary(g) % 3;
    let names: Vec<&str> = (0..segments).map(|_| pick(g, NAMES)).collect();
    (names.join("->"), segments)
}

fn term(g: &mut Gen, depth: usize) -> GeneratedFilter {
    let choice = if depth == 0 { u8::arbitrary(g) % 4 } else { u8::arbitrary(g) % 5 };
    match choice {
        0 => {
            let (text, references) = path(g);
            GeneratedFilter { text, references }
        }
        1 => {
            let (text, references) = path(g);
            GeneratedFilter {
                text: format!("not {text}"),
                references,
            }
        }
        2 => {
            let (text, references) = path(g);
            GeneratedFilter {
                text: format!("{text} {} {}", pick(g, OPS), pick(g, VALUES)),
                references,
            }
        }
        3 => {
            let (text, references) = path(g);
            GeneratedFilter {
                text: format!("{text} in ('a', 'b''c')"),
                references,
            }
        }
        _ => {
            let inner = expr(g, depth - 1);
            GeneratedFilter {
                text: format!("({})", inner.text),
                references: inner.references,
            }
        }
    }
}

fn expr(g: &mut Gen, depth: usize) -> GeneratedFilter {
    let terms = 1 + usize::arbitrary(g) % 3;
    let mut text = String::new();
    let mut references = 0;
    for index in 0..terms {
        if index > 0 {
            text.push_str(if bool::arbitrary(g) { " and " } else { " or " });
        }
        let t = term(g, depth);
        text.push_str(&t.text);
        references += t.references;
    }
    GeneratedFilter { text, references }
}

impl Arbitrary for GeneratedFilter {
    fn arbitrary(g: &mut Gen) -> Self {
        expr(g, 2)
    }
}

/// Property: compiling the same input twice yields byte-identical SQL
#[test]
fn prop_compilation_is_deterministic() {
    fn prop(filter: GeneratedFilter, org_id: u16, user_id: u16) -> TestResult {
        let tags = vec!["dis".to_string()];
        let first = compile_filter(&filter.text, org_id.into(), user_id.into(), &tags, "core_dev");
        let second = compile_filter(&filter.text, org_id.into(), user_id.into(), &tags, "core_dev");
        match (first, second) {
            (Ok(a), Ok(b)) => TestResult::from_bool(a == b),
            (Err(e), _) => TestResult::error(format!("{:?} failed: {e}", filter.text)),
            (_, Err(e)) => TestResult::error(format!("{:?} failed: {e}", filter.text)),
        }
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(GeneratedFilter, u16, u16) -> TestResult);
}

/// Property: one alias per path segment, none skipped
#[test]
fn prop_alias_count_matches_references() {
    fn prop(filter: GeneratedFilter) -> TestResult {
        let compiler =
            FilterCompiler::new(CompileOptions::default(), ValueColumns::default()).unwrap();
        match compiler.compile(&FilterQuery {
            filter: &filter.text,
            org_id: 1,
            user_id: 1,
            tags: &[],
            schema: "s",
        }) {
            Ok(compiled) => {
                let last = format!("td{}.name", filter.references);
                let beyond = format!("td{}.name", filter.references + 1);
                TestResult::from_bool(
                    compiled.alias_count == filter.references
                        && compiled.sql.contains(&last)
                        && !compiled.sql.contains(&beyond),
                )
            }
            Err(e) => TestResult::error(format!("{:?} failed: {e}", filter.text)),
        }
    }

    QuickCheck::new()
        .tests(200)
        .quickcheck(prop as fn(GeneratedFilter) -> TestResult);
}

/// Property: `not x` differs from `x` only by the NOT keyword
#[test]
fn prop_missing_is_negated_has() {
    fn prop(filter: GeneratedFilter) -> TestResult {
        // Only plain references are relevant here
        if filter.text.contains([' ', '(']) {
            return TestResult::discard();
        }
        let has = compile_filter(&filter.text, 1, 1, &[], "s");
        let missing = compile_filter(&format!("not {}", filter.text), 1, 1, &[], "s");
        match (has, missing) {
            (Ok(has), Ok(missing)) => TestResult::from_bool(
                missing == has.replacen("AND (e.id IN", "AND (NOT e.id IN", 1),
            ),
            _ => TestResult::error("compilation failed"),
        }
    }

    QuickCheck::new()
        .tests(50)
        .max_tests(5000)
        .quickcheck(prop as fn(GeneratedFilter) -> TestResult);
}
