//! Black-box, end-to-end exercises of the full mutate -> sync -> observe
//! cycle: component queries, exclusive/cascading relations, the
//! `dontFragment` archetype collapse, single- and multi-component hooks,
//! and optional (tag-like) components.

use std::cell::RefCell;
use std::rc::Rc;

use shard_ecs::prelude::*;

#[test]
fn query_matches_entities_by_exact_component_set() {
    let mut world = World::new();
    let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
    let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();

    let moving = world.new_entity().unwrap();
    let still = world.new_entity().unwrap();
    world.set(moving, position, Some(serde_json::json!({"x": 1}))).unwrap();
    world.set(moving, velocity, Some(serde_json::json!({"x": 2}))).unwrap();
    world.set(still, position, Some(serde_json::json!({"x": 3}))).unwrap();
    world.sync().unwrap();

    let both = world.create_query(vec![Selector::required(position), Selector::required(velocity)]);
    let mut both_seen = Vec::new();
    world.query_for_each(both, |entity, _| both_seen.push(entity));
    assert_eq!(both_seen, vec![moving]);
    world.release_query(both);

    let has_position = world.create_query(vec![Selector::required(position)]);
    let mut pos_seen = Vec::new();
    world.query_for_each(has_position, |entity, _| pos_seen.push(entity));
    pos_seen.sort_by_key(|e| e.raw());
    let mut expected = vec![moving, still];
    expected.sort_by_key(|e| e.raw());
    assert_eq!(pos_seen, expected);
    world.release_query(has_position);
}

#[test]
fn exclusive_cascade_delete_chain_removes_every_referrer() {
    let mut world = World::new();
    let child_of = world
        .component(ComponentFlags { exclusive: true, cascade_delete: true, ..Default::default() }, Some("ChildOf"))
        .unwrap();

    let a = world.new_entity().unwrap();
    let b = world.new_entity().unwrap();
    let c = world.new_entity().unwrap();
    let b_child_of_a = world.relation(child_of, Some(a)).unwrap();
    let c_child_of_b = world.relation(child_of, Some(b)).unwrap();
    world.set(b, b_child_of_a, None).unwrap();
    world.set(c, c_child_of_b, None).unwrap();
    world.sync().unwrap();

    assert!(world.exists(a) && world.exists(b) && world.exists(c));

    world.delete(a).unwrap();
    world.sync().unwrap();

    assert!(!world.exists(a));
    assert!(!world.exists(b));
    assert!(!world.exists(c));
}

#[test]
fn dont_fragment_relation_collapses_fan_out_into_one_archetype() {
    let mut world = World::new();
    let follows =
        world.component(ComponentFlags { dont_fragment: true, ..Default::default() }, Some("Follows")).unwrap();

    let parent_a = world.new_entity().unwrap();
    let parent_b = world.new_entity().unwrap();
    world.sync().unwrap();

    let mut children = Vec::new();
    for i in 0..100 {
        let child = world.new_entity().unwrap();
        let target = if i % 2 == 0 { parent_a } else { parent_b };
        let rel = world.relation(follows, Some(target)).unwrap();
        world.set(child, rel, Some(serde_json::json!(i))).unwrap();
        children.push((child, target));
    }
    world.sync().unwrap();

    let wildcard = world.relation(follows, None).unwrap();
    let archetypes_with_followers = shard_ecs::debug::WorldInspector::archetypes_with(&world, wildcard);
    assert_eq!(archetypes_with_followers.len(), 1, "every follower should collapse into one shape");

    for (child, target) in children {
        let rel = world.relation(follows, Some(target)).unwrap();
        assert!(world.has(child, rel));
    }
}

#[test]
fn multi_component_hook_fires_once_required_members_are_all_present() {
    let mut world = World::new();
    let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
    let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();

    let set_count = Rc::new(RefCell::new(0));
    let remove_count = Rc::new(RefCell::new(0));
    let last_remove_payload: Rc<RefCell<Option<serde_json::Value>>> = Rc::new(RefCell::new(None));

    let set_count_cb = set_count.clone();
    let remove_count_cb = remove_count.clone();
    let last_remove_payload_cb = last_remove_payload.clone();

    let selector = MultiSelector { required: smallvec::smallvec![position, velocity], optional: smallvec::smallvec![] };
    world.hook_multi(
        selector,
        HookCallbacks::new()
            .on_set(move |_cmds, _entity, _values| {
                *set_count_cb.borrow_mut() += 1;
            })
            .on_remove(move |_cmds, _entity, values| {
                *remove_count_cb.borrow_mut() += 1;
                *last_remove_payload_cb.borrow_mut() = values.get(&position).cloned();
            }),
    );

    let e = world.new_entity().unwrap();
    world.set(e, position, Some(serde_json::json!({"x": 1}))).unwrap();
    world.sync().unwrap();
    assert_eq!(*set_count.borrow(), 0, "velocity still missing, selector isn't satisfied yet");

    world.set(e, velocity, Some(serde_json::json!({"x": 2}))).unwrap();
    world.sync().unwrap();
    assert_eq!(*set_count.borrow(), 1);

    world.remove(e, position).unwrap();
    world.sync().unwrap();
    assert_eq!(*remove_count.borrow(), 1);
    assert_eq!(*last_remove_payload.borrow(), Some(serde_json::json!({"x": 1})));
}

#[test]
fn multi_component_hook_on_set_does_not_refire_when_an_optional_member_is_removed() {
    let mut world = World::new();
    let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
    let tag = world.component(ComponentFlags::default(), Some("Tag")).unwrap();

    let set_count = Rc::new(RefCell::new(0));
    let set_count_cb = set_count.clone();

    let selector = MultiSelector { required: smallvec::smallvec![position], optional: smallvec::smallvec![tag] };
    world.hook_multi(selector, HookCallbacks::new().on_set(move |_cmds, _entity, _values| {
        *set_count_cb.borrow_mut() += 1;
    }));

    let e = world.new_entity().unwrap();
    world.set(e, position, Some(serde_json::json!(1))).unwrap();
    world.set(e, tag, None).unwrap();
    world.sync().unwrap();
    assert_eq!(*set_count.borrow(), 1, "adding the required member satisfies the selector once");

    world.remove(e, tag).unwrap();
    world.sync().unwrap();
    assert_eq!(*set_count.borrow(), 1, "removing an optional member must not refire on_set");
}

#[test]
fn wildcard_relation_hook_fires_once_per_concrete_target() {
    let mut world = World::new();
    let likes = world.component(ComponentFlags::default(), Some("Likes")).unwrap();
    let wildcard = world.relation(likes, None).unwrap();

    let calls = Rc::new(RefCell::new(Vec::new()));
    let calls_cb = calls.clone();
    world.hook(
        wildcard,
        HookCallbacks::new().on_set(move |_cmds, entity, _values| {
            calls_cb.borrow_mut().push(entity);
        }),
    );

    let e = world.new_entity().unwrap();
    let target_one = world.new_entity().unwrap();
    let target_two = world.new_entity().unwrap();
    world.sync().unwrap();

    let rel_one = world.relation(likes, Some(target_one)).unwrap();
    let rel_two = world.relation(likes, Some(target_two)).unwrap();
    world.set(e, rel_one, Some(serde_json::json!(1))).unwrap();
    world.set(e, rel_two, Some(serde_json::json!(2))).unwrap();
    world.sync().unwrap();

    assert_eq!(calls.borrow().len(), 2);
    assert!(calls.borrow().iter().all(|&entity| entity == e));
}

#[test]
fn wildcard_hook_on_init_replays_once_per_existing_concrete_relation() {
    let mut world = World::new();
    let likes = world.component(ComponentFlags::default(), Some("Likes")).unwrap();
    let wildcard = world.relation(likes, None).unwrap();

    let e = world.new_entity().unwrap();
    let target_one = world.new_entity().unwrap();
    let target_two = world.new_entity().unwrap();
    world.sync().unwrap();

    let rel_one = world.relation(likes, Some(target_one)).unwrap();
    let rel_two = world.relation(likes, Some(target_two)).unwrap();
    world.set(e, rel_one, Some(serde_json::json!(1))).unwrap();
    world.set(e, rel_two, Some(serde_json::json!(2))).unwrap();
    world.sync().unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = seen.clone();
    world.hook(
        wildcard,
        HookCallbacks::new().on_init(move |_cmds, entity, values| {
            seen_cb.borrow_mut().push((entity, values.values().next().cloned()));
        }),
    );

    assert_eq!(seen.borrow().len(), 2, "on_init should fan out once per existing concrete relation");
    assert!(seen.borrow().iter().all(|(entity, _)| *entity == e));
}

#[test]
fn dont_fragment_wildcard_hook_on_init_replays_from_the_side_table() {
    let mut world = World::new();
    let follows =
        world.component(ComponentFlags { dont_fragment: true, ..Default::default() }, Some("Follows")).unwrap();
    let wildcard = world.relation(follows, None).unwrap();

    let e = world.new_entity().unwrap();
    let parent_a = world.new_entity().unwrap();
    let parent_b = world.new_entity().unwrap();
    world.sync().unwrap();

    let rel_a = world.relation(follows, Some(parent_a)).unwrap();
    let rel_b = world.relation(follows, Some(parent_b)).unwrap();
    world.set(e, rel_a, Some(serde_json::json!("a"))).unwrap();
    world.set(e, rel_b, Some(serde_json::json!("b"))).unwrap();
    world.sync().unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_cb = seen.clone();
    world.hook(
        wildcard,
        HookCallbacks::new().on_init(move |_cmds, entity, _values| {
            seen_cb.borrow_mut().push(entity);
        }),
    );

    assert_eq!(seen.borrow().len(), 2, "on_init must replay dontFragment side-table entries, not just the wildcard marker");
}

#[test]
fn optional_component_round_trips_sentinel_then_real_payload() {
    let mut world = World::new();
    let enabled = world.component(ComponentFlags::default(), Some("Enabled")).unwrap();

    let e = world.new_entity().unwrap();
    world.set(e, enabled, None).unwrap();
    world.sync().unwrap();

    assert!(world.has(e, enabled));
    assert_eq!(world.get(e, enabled).unwrap(), QueryValue::Value(serde_json::Value::Null));

    world.set(e, enabled, Some(serde_json::json!({"v": 1}))).unwrap();
    world.sync().unwrap();
    assert_eq!(world.get(e, enabled).unwrap(), QueryValue::Value(serde_json::json!({"v": 1})));
}
