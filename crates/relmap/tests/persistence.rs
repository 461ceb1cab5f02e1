//! Cascading persistence in dependency order.

mod common;

use common::{Fixture, int, one, slot};
use relmap::prelude::*;

fn text(value: &str) -> Value {
    Value::from(value)
}

fn link_one(record: &RecordRef, name: &str, foreign: &RecordRef) {
    record
        .set_related(name, RelatedValue::One(foreign.clone()))
        .unwrap();
}

fn link_many(record: &RecordRef, name: &str, foreign: &[&RecordRef]) {
    let records = foreign.iter().map(|r| (*r).clone()).collect();
    record
        .set_related(name, RelatedValue::Many(records))
        .unwrap();
}

fn writes(list: &[(&str, i64)]) -> Vec<(String, i64)> {
    list.iter().map(|(m, id)| ((*m).to_string(), *id)).collect()
}

#[test]
fn test_many_to_one_before_and_one_to_many_after() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[("name", text("Ann"))]);
    let post = fx.record("Post", &[("title", text("Hello"))]);
    let first = fx.record("Comment", &[("body", text("first"))]);
    let second = fx.record("Comment", &[("body", text("second"))]);
    link_one(&post, "author", &author);
    link_many(&post, "comments", &[&first, &second]);

    let tracker = relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(
        fx.writes(),
        writes(&[("Author", 100), ("Post", 101), ("Comment", 102), ("Comment", 103)])
    );
    assert_eq!(int(&post, "author_id"), Some(100));
    assert_eq!(int(&first, "post_id"), Some(101));
    assert_eq!(int(&second, "post_id"), Some(101));

    assert_eq!(tracker.len(), 4);
    for record in [&post, &author, &first, &second] {
        assert!(tracker.contains(record));
    }
    assert_eq!(tracker.position(&post), Some(0));
}

#[test]
fn test_phases_run_only_their_bucket() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[("id", Value::BigInt(1))]);
    let comment = fx.record("Comment", &[]);
    link_one(&post, "author", &author);
    link_many(&post, "comments", &[&comment]);

    let mapper = fx.mapper("Post");
    let rels = mapper.relationships();
    let mut tracker = Tracker::new();
    tracker.attach(&post);

    rels.persist_before_native(&post, &mut tracker).unwrap();
    assert_eq!(fx.writes(), writes(&[("Author", 100)]));

    rels.persist_after_native(&post, &mut tracker).unwrap();
    assert_eq!(fx.writes(), writes(&[("Author", 100), ("Comment", 101)]));
    assert_eq!(int(&comment, "post_id"), Some(1));
}

#[test]
fn test_shared_foreign_record_is_persisted_once() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[]);
    link_one(&post, "author", &author);
    link_one(&post, "editor", &author);

    let tracker = relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Author", 100), ("Post", 101)]));
    assert_eq!(int(&post, "author_id"), Some(100));
    assert_eq!(int(&post, "editor_id"), Some(100));
    assert_eq!(tracker.len(), 2);
}

#[test]
fn test_duplicate_collection_member_is_persisted_once() {
    let fx = Fixture::new();
    let post = fx.record("Post", &[]);
    let comment = fx.record("Comment", &[]);
    link_many(&post, "comments", &[&comment, &comment]);

    relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();
    assert_eq!(fx.writes(), writes(&[("Post", 100), ("Comment", 101)]));
}

#[test]
fn test_equal_but_distinct_records_are_both_persisted() {
    let fx = Fixture::new();
    let post = fx.record("Post", &[]);
    let a = fx.record("Comment", &[("body", text("same"))]);
    let b = fx.record("Comment", &[("body", text("same"))]);
    link_many(&post, "comments", &[&a, &b]);

    relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();
    assert_eq!(fx.writes().len(), 3);
}

#[test]
fn test_bidi_cycle_terminates() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let profile = fx.record("Profile", &[("bio", text("hi"))]);
    link_one(&author, "profile", &profile);
    link_one(&profile, "author", &author);

    let tracker = relmap::save(fx.mapper("Author").as_ref(), &author).unwrap();

    assert_eq!(fx.writes(), writes(&[("Author", 100), ("Profile", 101)]));
    assert_eq!(int(&profile, "author_id"), Some(100));
    assert_eq!(tracker.len(), 2);
}

#[test]
fn test_bidi_saved_from_the_other_side() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let profile = fx.record("Profile", &[]);
    link_one(&profile, "author", &author);
    link_one(&author, "profile", &profile);

    relmap::save(fx.mapper("Profile").as_ref(), &profile).unwrap();

    // The author is written first; its after phase finds the profile
    // already attached and leaves it to the outer save.
    assert_eq!(fx.writes(), writes(&[("Author", 100), ("Profile", 101)]));
    assert_eq!(int(&profile, "author_id"), Some(100));
}

#[test]
fn test_bidi_fix_sets_inverse_slot() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let profile = fx.record("Profile", &[]);
    link_one(&author, "profile", &profile);

    relmap::save(fx.mapper("Author").as_ref(), &author).unwrap();
    assert!(one(&profile, "author").unwrap().ptr_eq(&author));
}

#[test]
fn test_bidi_pair_is_freed_after_fix() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[("id", Value::BigInt(1))]);
    let profile = fx.record("Profile", &[]);
    link_one(&author, "profile", &profile);

    fx.mapper("Author")
        .relationships()
        .fix_foreign_record(&author)
        .unwrap();
    assert!(one(&profile, "author").unwrap().ptr_eq(&author));
    assert_eq!(int(&profile, "author_id"), Some(1));

    let (weak_author, weak_profile) = (author.downgrade(), profile.downgrade());
    drop(author);
    drop(profile);
    assert!(weak_author.is_dangling());
    assert!(weak_profile.is_dangling());
}

#[test]
fn test_one_to_one_written_after_native_with_its_key() {
    let fx = Fixture::new();
    let post = fx.record("Post", &[("title", text("hello"))]);
    let cover = fx.record("Cover", &[("url", text("c.png"))]);
    link_one(&post, "cover", &cover);

    relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Post", 100), ("Cover", 101)]));
    assert_eq!(int(&cover, "post_id"), Some(100));
    assert!(one(&post, "cover").unwrap().ptr_eq(&cover));
}

#[test]
fn test_self_referencing_graph_terminates() {
    let fx = Fixture::new();
    let post = fx.record("Post", &[]);
    let comment = fx.record("Comment", &[]);
    link_many(&post, "comments", &[&comment]);
    link_one(&comment, "post", &post);

    relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Post", 100), ("Comment", 101)]));
    assert_eq!(int(&comment, "post_id"), Some(100));
}

#[test]
fn test_nested_cascade_reaches_grandchildren() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[]);
    let comment = fx.record("Comment", &[]);
    let reply = fx.record("Reply", &[]);
    link_many(&author, "posts", &[&post]);
    link_many(&post, "comments", &[&comment]);
    link_many(&comment, "replies", &[&reply]);

    relmap::save(fx.mapper("Author").as_ref(), &author).unwrap();

    assert_eq!(
        fx.writes(),
        writes(&[("Author", 100), ("Post", 101), ("Comment", 102), ("Reply", 103)])
    );
    assert_eq!(int(&post, "author_id"), Some(100));
    assert_eq!(int(&comment, "post_id"), Some(101));
    assert_eq!(int(&reply, "comment_id"), Some(102));
}

#[test]
fn test_existing_keys_are_kept() {
    let fx = Fixture::new();
    let author = fx.insert("Author", &[("id", Value::BigInt(7))]);
    let post = fx.record("Post", &[]);
    link_one(&post, "author", &author);

    relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Author", 7), ("Post", 100)]));
    assert_eq!(int(&post, "author_id"), Some(7));
}

#[test]
fn test_empty_slots_are_skipped() {
    let fx = Fixture::new();
    let post = fx.record("Post", &[]);

    let tracker = relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Post", 100)]));
    assert_eq!(tracker.len(), 1);
    assert!(matches!(slot(&post, "comments"), RelatedValue::Many(v) if v.is_empty()));
}

#[test]
fn test_cascade_disabled_still_propagates_keys() {
    let fx = Fixture::with_config(RelationshipsConfig::new().cascade(false));
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[]);
    let comment = fx.record("Comment", &[]);
    link_one(&post, "author", &author);
    link_many(&post, "comments", &[&comment]);

    let tracker = relmap::save(fx.mapper("Post").as_ref(), &post).unwrap();

    assert_eq!(fx.writes(), writes(&[("Post", 100)]));
    assert_eq!(int(&comment, "post_id"), Some(100));
    assert_eq!(tracker.len(), 1);
}

#[test]
fn test_variant_persists_through_the_record_mapper() {
    let fx = Fixture::new();
    let like = fx.record("Like", &[]);
    let comment = fx.record("Comment", &[("body", text("nice"))]);
    link_one(&like, "likeable", &comment);

    relmap::save(fx.mapper("Like").as_ref(), &like).unwrap();

    assert_eq!(fx.writes(), writes(&[("Comment", 100), ("Like", 101)]));
    assert_eq!(like.get("likeable_type").unwrap(), text("comment"));
    assert_eq!(int(&like, "likeable_id"), Some(100));
}

#[test]
fn test_variant_rejects_undeclared_mapper() {
    let fx = Fixture::new();
    let like = fx.record("Like", &[]);
    let author = fx.record("Author", &[]);
    link_one(&like, "likeable", &author);

    let err = relmap::save(fx.mapper("Like").as_ref(), &like).unwrap_err();
    assert!(err.is_variant_not_found());
    assert!(fx.writes().is_empty());
}

#[test]
fn test_write_failure_propagates_and_stops_the_save() {
    let fx = Fixture::new();
    fx.fail_writes_for("Author");
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[]);
    link_one(&post, "author", &author);

    let err = relmap::save(fx.mapper("Post").as_ref(), &post).unwrap_err();
    assert_eq!(err.to_string(), "write to Author failed");
    assert!(fx.writes().is_empty());
}

#[test]
fn test_missing_foreign_mapper_propagates() {
    let fx = Fixture::new();
    let locator: std::sync::Arc<dyn MapperLocator> = fx.registry.clone();
    let rels = MapperRelationships::define(locator, "Post", |rels| {
        rels.many_to_one("tag", "Tag", &[("author_id", "id")])?;
        Ok(())
    })
    .unwrap();

    let post = RecordRef::new(Record::new(
        MapperId::new("Post"),
        Row::from_pairs([("id", Value::Null), ("author_id", Value::Null)]),
        rels.new_related(),
    ));
    let tag = fx.record("Author", &[]);
    link_one(&post, "tag", &tag);

    let mut tracker = Tracker::new();
    let err = rels.persist_before_native(&post, &mut tracker).unwrap_err();
    assert!(matches!(err, Error::MapperNotFound(id) if id.as_str() == "Tag"));
}

#[test]
fn test_persist_with_runs_steps_in_order() {
    let fx = Fixture::new();
    let author = fx.record("Author", &[]);
    let post = fx.record("Post", &[]);
    let comment = fx.record("Comment", &[]);
    link_one(&post, "author", &author);
    link_many(&post, "comments", &[&comment]);

    let mapper = fx.mapper("Post");
    let mut tracker = Tracker::new();
    tracker.attach(&post);

    mapper
        .relationships()
        .persist_with(&post, &mut tracker, |record| {
            // The author is already written and its key copied in.
            assert_eq!(int(record, "author_id"), Some(100));
            assert_eq!(fx.writes(), writes(&[("Author", 100)]));
            record.set("id", 500_i64)
        })
        .unwrap();

    assert_eq!(int(&comment, "post_id"), Some(500));
    assert_eq!(fx.writes(), writes(&[("Author", 100), ("Comment", 101)]));
}

#[test]
fn test_fix_native_and_foreign_record() {
    let fx = Fixture::new();
    let author = fx.insert("Author", &[("id", Value::BigInt(3))]);
    let post = fx.record("Post", &[("id", Value::BigInt(9))]);
    let comment = fx.record("Comment", &[]);
    link_one(&post, "author", &author);
    link_many(&post, "comments", &[&comment]);

    let mapper = fx.mapper("Post");
    mapper.relationships().fix_native_record(&post).unwrap();
    assert_eq!(int(&post, "author_id"), Some(3));
    assert_eq!(int(&comment, "post_id"), None);

    mapper.relationships().fix_foreign_record(&post).unwrap();
    assert_eq!(int(&comment, "post_id"), Some(9));

    // Variant fix writes the discriminator too.
    let like = fx.record("Like", &[]);
    link_one(&like, "likeable", &post);
    fx.mapper("Like").relationships().fix_native_record(&like).unwrap();
    assert_eq!(like.get("likeable_type").unwrap(), text("post"));
    assert_eq!(int(&like, "likeable_id"), Some(9));
}
