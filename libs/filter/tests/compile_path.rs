//! Compilation of `->` reference chains

use tagql_filter::{
    compile_filter, CompileOptions, Error, FilterCompiler, FilterQuery, KindSource, ValueColumns,
};

fn sql(filter: &str) -> String {
    compile_filter(filter, 5, 2, &[], "core_dev")
        .unwrap_or_else(|e| panic!("failed to compile {filter:?}: {e}"))
}

fn compiler(options: CompileOptions) -> FilterCompiler {
    FilterCompiler::new(options, ValueColumns::default()).unwrap()
}

fn query(filter: &str) -> FilterQuery<'_> {
    FilterQuery {
        filter,
        org_id: 5,
        user_id: 2,
        tags: &[],
        schema: "core_dev",
    }
}

#[test]
fn comparison_chain_nests_one_layer_per_segment() {
    let sql = sql("equipRef->siteRef->yearBuilt==1985");

    assert_eq!(sql.matches("IN (SELECT").count(), 3);
    for n in 1..=3 {
        assert!(
            sql.contains(&format!("hier_query{n} AS (")),
            "missing CTE {n}"
        );
    }
    assert_eq!(sql.matches("WITH RECURSIVE").count(), 1);

    // Terminal first, outermost segment last
    assert!(sql.contains("td1.name = 'yearBuilt'"));
    assert!(sql.contains(
        "e.id IN (SELECT entity_id FROM core_dev.entity_tag et3, core_dev.tag_def td3 \
         WHERE et3.tag_id = td3.id AND td3.name = 'equipRef' AND et3.value_ref IN \
         (SELECT entity_id FROM core_dev.entity_tag et2, core_dev.tag_def td2 \
         WHERE et2.tag_id = td2.id AND td2.name = 'siteRef' AND et2.value_ref IN \
         (SELECT et1.entity_id FROM core_dev.entity_tag et1, (SELECT ',' || string_agg(td1.name, ',') || ',' AS parent_id \
         FROM hier_query1, core_dev.tag_def td1 WHERE td1.id = hier_query1.parent_id) hq1, core_dev.tag_def td1 \
         WHERE et1.tag_id = td1.id AND td1.name = 'yearBuilt' \
         AND CASE WHEN hq1.parent_id LIKE '%,number,%' THEN et1.value_n = 1985 \
         WHEN hq1.parent_id LIKE '%,ref,%' THEN et1.value_ref = 1985 END GROUP BY et1.entity_id)))"
    ));
}

#[test]
fn chain_lookups_stay_inline() {
    let sql = sql("siteRef->yearBuilt < 1985");
    // Nothing is added to the base query's FROM list
    assert!(sql.contains("core_dev.entity_tag et WHERE e.id = et.entity_id AND (e.id IN ("));
    assert!(sql.contains("THEN et1.value_n < 1985"));
}

#[test]
fn existence_chain_has_no_ctes() {
    let sql = sql("equipRef->siteRef");
    assert!(!sql.contains("WITH RECURSIVE"));
    assert!(sql.contains(
        "e.id IN (SELECT entity_id FROM core_dev.entity_tag et2, core_dev.tag_def td2 \
         WHERE et2.tag_id = td2.id AND td2.name = 'equipRef' AND et2.value_ref IN \
         (SELECT entity_id FROM core_dev.entity_tag et1, core_dev.tag_def td1 \
         WHERE et1.tag_id = td1.id AND td1.name = 'siteRef'))"
    ));
}

#[test]
fn missing_chain_negates_only_the_outer_layer() {
    let sql = sql("not siteRef->yearBuilt");
    assert!(sql.contains("AND (NOT e.id IN (SELECT entity_id"));
    assert_eq!(sql.matches("NOT e.id").count(), 1);
    assert!(!sql.contains("value_ref NOT IN"));
}

#[test]
fn chain_aliases_continue_the_shared_counter() {
    let sql = sql("site and equipRef->siteRef->yearBuilt==1985 and area > 10");
    // site=1, yearBuilt=2, siteRef=3, equipRef=4, area=5
    assert!(sql.contains("td1.name = 'site'"));
    assert!(sql.contains("td2.name = 'yearBuilt'"));
    assert!(sql.contains("td3.name = 'siteRef'"));
    assert!(sql.contains("td4.name = 'equipRef'"));
    assert!(sql.contains("td5.name = 'area'"));
    assert!(sql.contains(") hq5 WHERE"));
    assert!(sql.contains("WITH RECURSIVE hier_query2 AS ("));
}

#[test]
fn in_list_on_a_chain() {
    let sql = sql("equipRef->dis in ('AHU-1')");
    assert!(sql.contains("THEN et1.value_s IN ('AHU-1') END GROUP BY et1.entity_id"));
    assert!(sql.contains("td2.name = 'equipRef' AND et2.value_ref IN (SELECT et1.entity_id"));
}

#[test]
fn path_depth_is_bounded() {
    let compiler = compiler(CompileOptions {
        max_path_depth: 3,
        ..CompileOptions::default()
    });
    assert!(compiler.compile(&query("a->b->c")).is_ok());

    let err = compiler.compile(&query("a->b->c->d == 1")).unwrap_err();
    assert_eq!(err, Error::PathTooDeep { depth: 4, max: 3 });
    assert!(err.is_client_error());
}

#[test]
fn default_depth_accepts_sixteen_segments() {
    let path: Vec<String> = (0..16).map(|i| format!("ref{i}")).collect();
    assert!(compile_filter(&path.join("->"), 1, 1, &[], "s").is_ok());

    let path: Vec<String> = (0..17).map(|i| format!("ref{i}")).collect();
    assert!(matches!(
        compile_filter(&path.join("->"), 1, 1, &[], "s"),
        Err(Error::PathTooDeep { depth: 17, max: 16 })
    ));
}

#[test]
fn parents_view_chain_inlines_view_lookup() {
    let compiler = compiler(CompileOptions {
        kind_source: KindSource::ParentsView,
        ..CompileOptions::default()
    });
    let compiled = compiler.compile(&query("siteRef->area > 10")).unwrap();
    assert!(!compiled.sql.contains("hier_query"));
    assert!(compiled
        .sql
        .contains("(SELECT max(tdp1.parent_ids) AS parent_id FROM core_dev.tag_def_parents tdp1"));
    assert_eq!(compiled.alias_count, 2);
}
