use vbridge_core::state::msr::{IA32_EFER, IA32_FS_BASE, IA32_LSTAR, IA32_PAT};
use vbridge_core::state::regs::{RFLAGS_AC, RFLAGS_RESERVED1, RFLAGS_VM};
use vbridge_core::state::segment::attr;
use vbridge_core::state::{
    CpuMode, Cr0, DescriptorTableRegister, Efer, Gpr, SegReg, SegmentDescriptor, VectorTier,
    VECTOR_WORDS,
};
use vbridge_core::{Bridge, BridgeError};

fn bridge_with_core() -> Bridge {
    let mut bridge = Bridge::default();
    bridge.create(0).unwrap();
    bridge
}

#[test]
fn rip_shadow_keeps_previous_value() {
    let mut bridge = bridge_with_core();
    bridge.set_rip(0, 0x7C00);
    bridge.set_rip(0, 0x0000_0000_0040_1000);
    assert_eq!(bridge.rip(0), 0x0000_0000_0040_1000);
    assert_eq!(bridge.prev_rip(0), 0x7C00);
}

#[test]
fn rsp_shadow_tracks_every_write_path() {
    let mut bridge = bridge_with_core();
    bridge.set_rsp(0, 0x7FFF_F000);
    assert_eq!(bridge.speculative_rsp(0), 0x7FFF_F000);
    bridge.set_gpr(0, Gpr::Rsp as usize, 0x7FFF_EFF8);
    assert_eq!(bridge.rsp(0), 0x7FFF_EFF8);
    assert_eq!(bridge.speculative_rsp(0), 0x7FFF_EFF8);
}

#[test]
fn data_segment_tuple_round_trips() {
    let mut bridge = bridge_with_core();
    let ds = SegmentDescriptor {
        present: true,
        selector: 0x0010,
        base: 0x0000_0000_0000_0000,
        limit: 0xFFFF_FFFF,
        attr: 0x9B,
    };
    bridge.set_ds(0, ds);
    assert_eq!(bridge.ds(0), ds);
    assert_eq!(bridge.segment(0, SegReg::Ds), ds);
    assert_eq!(bridge.es(0), SegmentDescriptor::default());
}

#[test]
fn system_segments_and_tables_round_trip() {
    let mut bridge = bridge_with_core();
    let tr = SegmentDescriptor {
        present: true,
        selector: 0x40,
        base: 0xFFFF_F800_0012_3000,
        limit: 0x67,
        attr: 0x8B,
    };
    let ldtr = SegmentDescriptor {
        present: false,
        selector: 0,
        base: 0,
        limit: 0xFFFF,
        attr: 0x82,
    };
    let gdtr = DescriptorTableRegister {
        base: 0xFFFF_F800_0000_1000,
        limit: 0x7F,
    };
    let idtr = DescriptorTableRegister {
        base: 0xFFFF_F800_0000_2000,
        limit: 0xFFF,
    };
    bridge.set_tr(0, tr);
    bridge.set_ldtr(0, ldtr);
    bridge.set_gdtr(0, gdtr);
    bridge.set_idtr(0, idtr);
    assert_eq!(bridge.tr(0), tr);
    assert_eq!(bridge.ldtr(0), ldtr);
    assert_eq!(bridge.gdtr(0), gdtr);
    assert_eq!(bridge.idtr(0), idtr);
}

#[test]
fn setters_do_not_rederive_mode() {
    let mut bridge = bridge_with_core();
    bridge.set_cr0(0, (Cr0::PE | Cr0::PG).bits());
    bridge.set_efer(0, (Efer::LME | Efer::LMA).bits());
    bridge.set_cs(
        0,
        SegmentDescriptor {
            present: true,
            selector: 0x10,
            base: 0,
            limit: 0xFFFF_FFFF,
            attr: 0x9B | attr::L | attr::G,
        },
    );
    assert_eq!(bridge.cpu(0).derived().mode, CpuMode::Real);

    bridge.sync_derived_state(0);
    assert_eq!(bridge.cpu(0).derived().mode, CpuMode::Long64);
}

#[test]
fn rflags_setter_rederives_v8086_and_alignment() {
    let mut bridge = bridge_with_core();
    bridge.set_cr0(0, (Cr0::PE | Cr0::AM).bits());
    bridge.sync_derived_state(0);

    bridge.set_rflags(0, RFLAGS_RESERVED1 | RFLAGS_VM | RFLAGS_AC);
    let derived = *bridge.cpu(0).derived();
    assert_eq!(derived.mode, CpuMode::V8086);
    assert!(derived.alignment_check);
    assert_eq!(bridge.rflags(0), RFLAGS_RESERVED1 | RFLAGS_VM | RFLAGS_AC);
}

#[test]
fn control_and_debug_registers_round_trip_defined_bits() {
    let mut bridge = bridge_with_core();
    bridge.set_cr0(0, 0x8005_0033);
    bridge.set_cr2(0, 0xFFFF_8000_0000_1000);
    bridge.set_cr3(0, 0x0000_0001_2345_6000);
    bridge.set_cr4(0, 0x0035_06F8);
    bridge.set_xcr0(0, 0x7);
    bridge.set_efer(0, 0xD01);
    assert_eq!(bridge.cr0(0), 0x8005_0033);
    assert_eq!(bridge.cr2(0), 0xFFFF_8000_0000_1000);
    assert_eq!(bridge.cr3(0), 0x0000_0001_2345_6000);
    assert_eq!(bridge.cr4(0), 0x0035_06F8);
    assert_eq!(bridge.xcr0(0), 0x7);
    assert_eq!(bridge.efer(0), 0xD01);

    for i in 0..4 {
        bridge.set_dr(0, i, 0x1000 * (i as u64 + 1));
    }
    bridge.set_dr6(0, 0x4001);
    bridge.set_dr7(0, 0x0000_0401);
    assert_eq!(bridge.dr(0, 2), 0x3000);
    assert_eq!(bridge.dr6(0), 0x4001);
    assert_eq!(bridge.dr7(0), 0x0000_0401);
}

#[test]
fn cr8_is_not_a_bitwise_inverse_of_tpr() {
    let mut bridge = bridge_with_core();
    bridge.set_apic_tpr(0, 0x5A);
    assert_eq!(bridge.cr8(0), 0x5);

    bridge.set_cr8(0, 0x5);
    assert_eq!(bridge.cr8(0), 0x5);
    assert_eq!(bridge.apic_tpr(0), 0x50);
}

#[test]
fn msrs_round_trip_by_name_and_index() {
    let mut bridge = bridge_with_core();
    bridge.set_lstar(0, 0xFFFF_F800_0100_0000);
    bridge.set_sfmask(0, 0x0004_7700);
    bridge.set_sysenter_cs(0, 0x10);
    bridge.set_tsc(0, 123_456_789);
    bridge.set_tsc_aux(0, 3);
    bridge.set_kernel_gs_base(0, 0xFFFF_F800_0200_0000);

    assert_eq!(bridge.rdmsr(0, IA32_LSTAR), Some(0xFFFF_F800_0100_0000));
    assert_eq!(bridge.sfmask(0), 0x0004_7700);
    assert_eq!(bridge.sysenter_cs(0), 0x10);
    assert_eq!(bridge.tsc(0), 123_456_789);
    assert_eq!(bridge.tsc_aux(0), 3);

    assert!(bridge.wrmsr(0, IA32_PAT, 0x0007_0406_0007_0406));
    assert_eq!(bridge.pat(0), 0x0007_0406_0007_0406);

    assert!(bridge.wrmsr(0, IA32_EFER, 0x501));
    assert_eq!(bridge.efer(0), 0x501);
    assert!(bridge.wrmsr(0, IA32_FS_BASE, 0x7FF0_0000_0000));
    assert_eq!(bridge.fs(0).base, 0x7FF0_0000_0000);

    assert!(!bridge.wrmsr(0, 0x0000_0DEA, 1));
    assert_eq!(bridge.rdmsr(0, 0x0000_0DEA), None);
}

#[test]
fn vector_writes_narrow_to_the_build_tier() {
    let mut bridge = bridge_with_core();
    let full: [u64; VECTOR_WORDS] =
        std::array::from_fn(|i| 0x0101_0101_0101_0101 * (i as u64 + 1));
    bridge.set_zmm(0, 5, &full);

    let words = VectorTier::CURRENT.words();
    let got = bridge.zmm(0, 5);
    assert_eq!(got[..words], full[..words]);
    assert!(got[words..].iter().all(|w| *w == 0));
}

#[cfg(not(feature = "evex"))]
#[test]
fn upper_vector_bank_is_discarded_without_evex() {
    let mut bridge = bridge_with_core();
    bridge.set_zmm(0, 20, &[u64::MAX; VECTOR_WORDS]);
    assert_eq!(bridge.zmm(0, 20), [0; VECTOR_WORDS]);
}

#[test]
fn fp_state_round_trips() {
    let mut bridge = bridge_with_core();
    bridge.set_fcw(0, 0x037F);
    bridge.set_fsw(0, 0x3800);
    bridge.set_ftw(0, 0xFFFF);
    bridge.set_fop(0, 0x01D9);
    bridge.set_mxcsr(0, 0x1F80);
    bridge.set_mxcsr_mask(0, 0xFFBF);
    bridge.set_fp_st(0, 0, -42);
    bridge.set_fp_st(0, 7, i64::MAX);

    assert_eq!(bridge.fcw(0), 0x037F);
    assert_eq!(bridge.fsw(0), 0x3800);
    assert_eq!(bridge.ftw(0), 0xFFFF);
    assert_eq!(bridge.fop(0), 0x01D9);
    assert_eq!(bridge.mxcsr(0), 0x1F80);
    assert_eq!(bridge.mxcsr_mask(0), 0xFFBF);
    assert_eq!(bridge.fp_st(0, 0), -42);
    assert_eq!(bridge.fp_st(0, 7), i64::MAX);
}

#[test]
fn legacy_bulk_segment_load_is_unsupported() {
    let mut bridge = bridge_with_core();
    let segs = [SegmentDescriptor::default(); 6];
    assert_eq!(
        bridge.set_segments_legacy(0, &segs),
        Err(BridgeError::Unsupported {
            op: "set_segments_legacy"
        })
    );
}

#[cfg(not(target_arch = "wasm32"))]
mod prop {
    use proptest::prelude::*;
    use vbridge_core::state::msr::IA32_LSTAR;

    use super::bridge_with_core;

    proptest! {
        #[test]
        fn gpr_writes_land_in_one_register(index in 0usize..16, val in any::<u64>()) {
            let mut bridge = bridge_with_core();
            bridge.set_gpr(0, index, val);
            for other in 0..16 {
                let expected = if other == index { val } else { 0 };
                prop_assert_eq!(bridge.gpr(0, other), expected);
            }
        }

        #[test]
        fn lstar_matches_across_name_and_index(val in any::<u64>()) {
            let mut bridge = bridge_with_core();
            bridge.set_lstar(0, val);
            prop_assert_eq!(bridge.rdmsr(0, IA32_LSTAR), Some(val));
            prop_assert!(bridge.wrmsr(0, IA32_LSTAR, !val));
            prop_assert_eq!(bridge.lstar(0), !val);
        }
    }
}
