mod common;

use common::rack_with_files;
use spicerack::kernel::Kernel;
use spicerack::{Kind, Request};

#[test]
fn furnish_then_unload_restores_the_registry() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("base.bsp", &[699], Some((0.0, 1000.0))),
        ("extra1.bsp", &[699], Some((0.0, 1000.0))),
        ("extra2.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let base = Kernel::file(&mut rack, "base.bsp").unwrap();
    rack.furnish(&base, &Request::all()).unwrap();
    let before: Vec<String> = rack
        .furnished(Kind::Spk)
        .iter()
        .map(|s| s.to_string())
        .collect();

    let pair = Kernel::set(&mut rack, &["extra1.bsp", "extra2.bsp"], false).unwrap();
    rack.furnish(&pair, &Request::all()).unwrap();
    assert_eq!(rack.furnished(Kind::Spk).len(), 3);

    rack.unload(&pair, &Request::all()).unwrap();
    let after: Vec<String> = rack
        .furnished(Kind::Spk)
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn ordered_sets_preserve_declared_order() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("first.bsp", &[699], Some((0.0, 1000.0))),
        ("second.bsp", &[699], Some((0.0, 1000.0))),
        ("third.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let ordered = Kernel::set(
        &mut rack,
        &["first.bsp", "second.bsp", "third.bsp"],
        true,
    )
    .unwrap();
    rack.furnish(&ordered, &Request::all()).unwrap();
    assert_eq!(
        rack.furnished(Kind::Spk),
        vec!["first.bsp", "second.bsp", "third.bsp"]
    );

    // Rotating the declared order forces reinsertion to restore it
    let rotated = Kernel::set(
        &mut rack,
        &["third.bsp", "first.bsp", "second.bsp"],
        true,
    )
    .unwrap();
    rack.furnish(&rotated, &Request::all()).unwrap();
    assert_eq!(
        rack.furnished(Kind::Spk),
        vec!["third.bsp", "first.bsp", "second.bsp"]
    );
}

#[test]
fn duplicate_basenames_keep_the_last_occurrence() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("a.bsp", &[699], Some((0.0, 1000.0))),
        ("b.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let set = Kernel::set(&mut rack, &["a.bsp", "b.bsp", "a.bsp"], true).unwrap();
    rack.furnish(&set, &Request::all()).unwrap();
    // a.bsp's last occurrence places it after b.bsp
    assert_eq!(rack.furnished(Kind::Spk), vec!["b.bsp", "a.bsp"]);
}

#[test]
fn exclusions_are_unloaded_on_furnish() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("old.bsp", &[699], Some((0.0, 1000.0))),
        ("new.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let old = Kernel::file(&mut rack, "old.bsp").unwrap();
    rack.furnish(&old, &Request::all()).unwrap();
    assert_eq!(rack.furnished(Kind::Spk), vec!["old.bsp"]);

    let mut new = Kernel::file(&mut rack, "new.bsp").unwrap();
    new.exclude(&mut rack, vec!["old.bsp"]).unwrap();
    let top = rack.furnish(&new, &Request::all()).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["new.bsp"]);
    assert_eq!(top, 0);
}

#[test]
fn exclusions_spare_non_overlapping_files() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("early.bsp", &[699], Some((0.0, 100.0))),
        ("late.bsp", &[699], Some((5.0e6, 6.0e6))),
    ]);

    let early = Kernel::file(&mut rack, "early.bsp").unwrap();
    rack.furnish(&early, &Request::all()).unwrap();

    // The exclusion only applies over the requested range, which early.bsp is outside
    let mut late = Kernel::file(&mut rack, "late.bsp").unwrap();
    late.exclude(&mut rack, vec!["early.bsp"]).unwrap();
    rack.furnish(&late, &Request::over(5.0e6, 6.0e6)).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["early.bsp", "late.bsp"]);
}

#[test]
fn prerequisites_end_up_below() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("planets.bsp", &[699], Some((0.0, 1000.0))),
        ("moons.bsp", &[610], Some((0.0, 1000.0))),
    ]);

    let mut moons = Kernel::file(&mut rack, "moons.bsp").unwrap();
    moons.require(&mut rack, vec!["planets.bsp"], false).unwrap();
    let top = rack.furnish(&moons, &Request::all()).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["planets.bsp", "moons.bsp"]);
    assert_eq!(top, 1);
}

#[test]
fn postrequisites_end_up_above() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("base.bsp", &[699], Some((0.0, 1000.0))),
        ("patch.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let mut base = Kernel::file(&mut rack, "base.bsp").unwrap();
    base.require(&mut rack, vec!["patch.bsp"], true).unwrap();
    rack.furnish(&base, &Request::all()).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["base.bsp", "patch.bsp"]);
}

#[test]
fn corequisites_of_another_kind_are_furnished_independently() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("pointing.bc", &[-82000], Some((0.0, 1000.0))),
        ("clock.tsc", &[-82], None),
    ]);

    let mut pointing = Kernel::file(&mut rack, "pointing.bc").unwrap();
    pointing.require(&mut rack, vec!["clock.tsc"], false).unwrap();
    rack.furnish(&pointing, &Request::all()).unwrap();

    assert_eq!(rack.furnished(Kind::Ck), vec!["pointing.bc"]);
    assert_eq!(rack.furnished(Kind::Sclk), vec!["clock.tsc"]);
}

#[test]
fn vetoes_evict_overlapping_companions() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("jup_old.bsp", &[599], Some((0.0, 1000.0))),
        ("jup_new.bsp", &[599], Some((0.0, 1000.0))),
        ("sat337.bsp", &[699], Some((0.0, 1000.0))),
    ]);
    rack.add_veto(r"jup_new\.bsp", &[r"jup_old\.bsp"]).unwrap();

    let old = Kernel::file(&mut rack, "jup_old.bsp").unwrap();
    let sat = Kernel::file(&mut rack, "sat337.bsp").unwrap();
    rack.furnish(&old, &Request::all()).unwrap();
    rack.furnish(&sat, &Request::all()).unwrap();

    let new = Kernel::file(&mut rack, "jup_new.bsp").unwrap();
    rack.furnish(&new, &Request::all()).unwrap();

    // The companion is evicted silently; unrelated files keep their place
    assert_eq!(rack.furnished(Kind::Spk), vec!["sat337.bsp", "jup_new.bsp"]);
}

#[test]
fn shadows_reinsert_the_front_file_on_top() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("sat_hi.bsp", &[699], Some((0.0, 1000.0))),
        ("sat_lo.bsp", &[699], Some((0.0, 1000.0))),
    ]);
    rack.add_shadow(r"sat_hi\.bsp", &[r"sat_lo\.bsp"]).unwrap();

    let hi = Kernel::file(&mut rack, "sat_hi.bsp").unwrap();
    let lo = Kernel::file(&mut rack, "sat_lo.bsp").unwrap();
    rack.furnish(&hi, &Request::all()).unwrap();
    rack.furnish(&lo, &Request::all()).unwrap();
    assert_eq!(rack.furnished(Kind::Spk), vec!["sat_hi.bsp", "sat_lo.bsp"]);

    // Re-furnishing the front file finds it below its shadow target and reinserts it
    rack.furnish(&hi, &Request::all()).unwrap();
    assert_eq!(rack.furnished(Kind::Spk), vec!["sat_lo.bsp", "sat_hi.bsp"]);
}

#[test]
fn a_veto_takes_priority_over_a_shadow() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("front.bsp", &[699], Some((0.0, 1000.0))),
        ("behind.bsp", &[699], Some((0.0, 1000.0))),
    ]);
    // Both rules name the same pair: the veto evicts, subsuming the reorder
    rack.add_veto(r"front\.bsp", &[r"behind\.bsp"]).unwrap();
    rack.add_shadow(r"front\.bsp", &[r"behind\.bsp"]).unwrap();

    let behind = Kernel::file(&mut rack, "behind.bsp").unwrap();
    rack.furnish(&behind, &Request::all()).unwrap();

    let front = Kernel::file(&mut rack, "front.bsp").unwrap();
    rack.furnish(&front, &Request::all()).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["front.bsp"]);
}

#[test]
fn members_outside_the_request_are_skipped() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("early.bsp", &[699], Some((0.0, 100.0))),
        ("late.bsp", &[699], Some((5.0e6, 6.0e6))),
    ]);

    let both = Kernel::set(&mut rack, &["early.bsp", "late.bsp"], true).unwrap();
    rack.furnish(&both, &Request::over(5.0e6, 6.0e6)).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["late.bsp"]);
}

#[test]
fn identifier_mismatches_are_skipped() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("saturn.bsp", &[699], Some((0.0, 1000.0))),
        ("jupiter.bsp", &[599], Some((0.0, 1000.0))),
    ]);

    let both = Kernel::set(&mut rack, &["saturn.bsp", "jupiter.bsp"], false).unwrap();
    rack.furnish(&both, &Request::for_ids([599])).unwrap();

    assert_eq!(rack.furnished(Kind::Spk), vec!["jupiter.bsp"]);
}

#[test]
fn used_reports_without_mutating() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("planets.bsp", &[699], Some((0.0, 1000.0))),
        ("moons.bsp", &[610], Some((0.0, 1000.0))),
        ("patch.bsp", &[610], Some((0.0, 1000.0))),
        ("clock.tsc", &[-82], None),
    ]);

    let mut moons = Kernel::file(&mut rack, "moons.bsp").unwrap();
    moons.require(&mut rack, vec!["planets.bsp"], false).unwrap();
    moons.require(&mut rack, vec!["patch.bsp"], true).unwrap();
    moons.require(&mut rack, vec!["clock.tsc"], false).unwrap();

    let used = rack.used(&moons, &Request::all()).unwrap();
    let names: Vec<&str> = used.iter().map(|&h| rack.basename(h)).collect();
    assert_eq!(
        names,
        vec!["clock.tsc", "planets.bsp", "moons.bsp", "patch.bsp"]
    );

    // A pure query: nothing was furnished
    assert!(rack.furnished(Kind::Spk).is_empty());
    assert!(rack.furnished(Kind::Sclk).is_empty());
}

#[test]
fn stacks_chain_precedence_across_members() {
    let (mut rack, _tmp) = rack_with_files(&[
        ("lowest.bsp", &[699], Some((0.0, 1000.0))),
        ("middle.bsp", &[699], Some((0.0, 1000.0))),
        ("highest.bsp", &[699], Some((0.0, 1000.0))),
    ]);

    let lowest = Kernel::file(&mut rack, "lowest.bsp").unwrap();
    let upper = Kernel::set(&mut rack, &["middle.bsp", "highest.bsp"], true).unwrap();
    let stack = Kernel::stack(vec![lowest, upper]).unwrap();

    // Furnish the top file first so the stack has to restore the declared order
    let highest = Kernel::file(&mut rack, "highest.bsp").unwrap();
    rack.furnish(&highest, &Request::all()).unwrap();

    rack.furnish(&stack, &Request::all()).unwrap();
    assert_eq!(
        rack.furnished(Kind::Spk),
        vec!["lowest.bsp", "middle.bsp", "highest.bsp"]
    );
}

#[test]
fn missing_files_are_reported() {
    let (mut rack, _tmp) = rack_with_files(&[("present.bsp", &[699], Some((0.0, 1000.0)))]);

    let absent = Kernel::file(&mut rack, "absent.bsp").unwrap();
    rack.set_time(rack.lookup("absent.bsp").unwrap(), Some((0.0, 1000.0)))
        .unwrap();
    rack.set_naif_ids(rack.lookup("absent.bsp").unwrap(), [699].into_iter().collect());

    let error = rack.furnish(&absent, &Request::all());
    assert!(matches!(
        error,
        Err(spicerack::SpiceRackError::NotFound(_))
    ));
}
