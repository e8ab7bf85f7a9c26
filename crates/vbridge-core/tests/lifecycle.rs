use vbridge_core::state::{Gpr, SegReg, VectorTier, VECTOR_WORDS};
use vbridge_core::{Bridge, BridgeError, MAX_CORES};

#[test]
fn fresh_core_reads_zero_everywhere() {
    let mut bridge = Bridge::default();
    bridge.create(2).unwrap();
    let id = 2;

    assert_eq!(bridge.rip(id), 0);
    assert_eq!(bridge.prev_rip(id), 0);
    assert_eq!(bridge.rsp(id), 0);
    assert_eq!(bridge.speculative_rsp(id), 0);
    assert_eq!(bridge.rflags(id), 0);
    for reg in Gpr::ALL {
        assert_eq!(bridge.gpr(id, reg as usize), 0);
    }
    for reg in SegReg::ALL {
        assert_eq!(bridge.segment(id, reg), Default::default());
    }
    assert_eq!(bridge.ldtr(id), Default::default());
    assert_eq!(bridge.tr(id), Default::default());
    assert_eq!(bridge.gdtr(id), Default::default());
    assert_eq!(bridge.idtr(id), Default::default());

    for i in 0..4 {
        assert_eq!(bridge.dr(id, i), 0);
    }
    assert_eq!((bridge.dr6(id), bridge.dr7(id)), (0, 0));
    assert_eq!(
        (bridge.cr0(id), bridge.cr2(id), bridge.cr3(id), bridge.cr4(id), bridge.cr8(id)),
        (0, 0, 0, 0, 0)
    );
    assert_eq!((bridge.xcr0(id), bridge.efer(id)), (0, 0));

    assert_eq!(bridge.kernel_gs_base(id), 0);
    assert_eq!(bridge.star(id), 0);
    assert_eq!(bridge.lstar(id), 0);
    assert_eq!(bridge.cstar(id), 0);
    assert_eq!(bridge.sfmask(id), 0);
    assert_eq!(bridge.sysenter_cs(id), 0);
    assert_eq!(bridge.sysenter_esp(id), 0);
    assert_eq!(bridge.sysenter_eip(id), 0);
    assert_eq!(bridge.tsc(id), 0);
    assert_eq!(bridge.tsc_aux(id), 0);
    assert_eq!(bridge.pat(id), 0);
    assert_eq!(bridge.apic_base(id), 0);

    for i in 0..VectorTier::Evex.registers() {
        assert_eq!(bridge.zmm(id, i), [0; VECTOR_WORDS]);
    }
    assert_eq!(
        (bridge.fcw(id), bridge.fsw(id), bridge.ftw(id), bridge.fop(id)),
        (0, 0, 0, 0)
    );
    for i in 0..8 {
        assert_eq!(bridge.fp_st(id, i), 0);
    }
    assert_eq!((bridge.mxcsr(id), bridge.mxcsr_mask(id)), (0, 0));
    assert!(bridge.state(id).is_zeroed());
}

#[test]
fn create_rejects_bad_and_duplicate_ids() {
    let mut bridge = Bridge::default();
    bridge.create(0).unwrap();
    assert_eq!(bridge.create(0), Err(BridgeError::SlotOccupied { id: 0 }));
    assert_eq!(
        bridge.create(MAX_CORES),
        Err(BridgeError::CoreIdOutOfRange {
            id: MAX_CORES,
            max: MAX_CORES
        })
    );
}

#[test]
fn destroy_frees_the_slot_for_reuse() {
    let mut bridge = Bridge::default();
    bridge.create(3).unwrap();
    bridge.set_rip(3, 0xFFF0);
    bridge.destroy(3);
    assert!(!bridge.is_live(3));

    bridge.create(3).unwrap();
    assert_eq!(bridge.rip(3), 0, "recreated core must start from zero");
}

#[test]
#[should_panic(expected = "core 4 does not exist")]
fn destroy_of_empty_slot_panics() {
    let mut bridge = Bridge::default();
    bridge.destroy(4);
}

#[test]
#[should_panic(expected = "core 1 does not exist")]
fn accessor_on_destroyed_core_panics() {
    let mut bridge = Bridge::default();
    bridge.create(1).unwrap();
    bridge.destroy(1);
    bridge.rip(1);
}

#[cfg(not(feature = "evex"))]
#[test]
#[should_panic(expected = "cpu0: fatal")]
fn self_check_rejects_simd_wider_than_build() {
    let mut bridge = Bridge::default();
    bridge.params_mut().set_enum("cpuid.simd", "avx512").unwrap();
    let _ = bridge.create(0);
}

#[test]
fn identity_follows_params() {
    let mut bridge = Bridge::default();
    bridge.params_mut().set_enum("cpuid.apic", "legacy").unwrap();
    bridge.create(7).unwrap();
    let identity = *bridge.cpu(7).identity();
    assert_eq!(identity.apic_id, 7);
    assert_eq!(identity.apic_id_mask, 0xf);
}

#[test]
fn live_cores_lists_occupied_slots() {
    let mut bridge = Bridge::default();
    for id in [9, 1, 4] {
        bridge.create(id).unwrap();
    }
    assert_eq!(bridge.live_cores().collect::<Vec<_>>(), vec![1, 4, 9]);
}
