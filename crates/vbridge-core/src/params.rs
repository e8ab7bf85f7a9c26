//! Name-keyed simulator parameters.
//!
//! The emulation core reads its CPU model and CPUID knobs by dotted name (`cpu.model`,
//! `cpuid.simd`, ...). Each name maps to one [`SimParam`] of a fixed kind; lookups of the wrong
//! kind are errors, not conversions.

use std::collections::BTreeMap;

use vbridge_state::VectorTier;

use crate::error::{BridgeError, Result};
use crate::registry::MAX_CORES;

pub const CPU_MODELS: &[&str] = &[
    "bx_generic",
    "pentium",
    "pentium_mxx",
    "amd_k6_2_chomper",
    "p2_klamath",
    "p3_katmai",
    "p4_willamette",
    "core_duo_t2500_yonah",
    "atom_n270",
    "p4_prescott_celeron_336",
    "athlon64_clawhammer",
    "athlon64_venice",
    "turion64_tyler",
    "phenom_8650_toliman",
    "core2_penryn_t9600",
    "corei5_lynnfield_750",
    "corei5_arrandale_m520",
    "corei7_sandy_bridge_2600k",
    "zambezi",
    "trinity_apu",
    "ryzen",
    "corei7_ivy_bridge_3770k",
    "corei7_haswell_4770",
    "broadwell_ult",
    "corei7_skylake_x",
    "corei3_cnl",
    "corei7_icelake_u",
    "tigerlake",
];

pub const APIC_MODES: &[&str] = &["legacy", "xapic", "xapic_ext", "x2apic"];

pub const SIMD_LEVELS: &[&str] = &[
    "none", "sse", "sse2", "sse3", "ssse3", "sse4_1", "sse4_2", "avx", "avx2", "avx512",
];

/// Vector width a `cpuid.simd` choice needs from the build.
pub fn simd_tier(level: &str) -> VectorTier {
    match level {
        "avx" | "avx2" => VectorTier::Avx,
        "avx512" => VectorTier::Evex,
        _ => VectorTier::Sse,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimParam {
    Enum {
        choices: &'static [&'static str],
        index: usize,
    },
    Num {
        min: u64,
        max: u64,
        value: u64,
    },
    Bool(bool),
    Str(String),
}

impl SimParam {
    pub fn kind(&self) -> &'static str {
        match self {
            SimParam::Enum { .. } => "enum",
            SimParam::Num { .. } => "num",
            SimParam::Bool(_) => "bool",
            SimParam::Str(_) => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimParams {
    params: BTreeMap<&'static str, SimParam>,
}

fn enum_param(choices: &'static [&'static str], default: &str) -> SimParam {
    let index = choices.iter().position(|c| *c == default).unwrap_or(0);
    SimParam::Enum { choices, index }
}

fn num(min: u64, max: u64, value: u64) -> SimParam {
    SimParam::Num { min, max, value }
}

impl Default for SimParams {
    fn default() -> Self {
        let mut m = BTreeMap::new();

        m.insert("cpu.model", enum_param(CPU_MODELS, "tigerlake"));
        m.insert("cpuid.apic", enum_param(APIC_MODES, "x2apic"));
        let simd = match VectorTier::CURRENT {
            VectorTier::Sse => "sse4_2",
            VectorTier::Avx | VectorTier::Evex => "avx2",
        };
        m.insert("cpuid.simd", enum_param(SIMD_LEVELS, simd));

        m.insert("cpu.n_threads", num(1, 4, 1));
        m.insert("cpu.n_cores", num(1, 8, 1));
        m.insert("cpu.n_processors", num(1, MAX_CORES as u64, 1));
        m.insert("cpu.quantum", num(1, 32, 16));
        m.insert("cpuid.level", num(5, 6, 6));
        m.insert("cpuid.vmx", num(0, 2, 2));
        m.insert("cpuid.bmi", num(0, 2, 2));
        m.insert("cpuid.stepping", num(0, 0, 0));
        m.insert("cpuid.model", num(0, 0, 0));
        m.insert("cpuid.family", num(0, 6, 6));

        for name in [
            "cpuid.mmx",
            "cpuid.sse4a",
            "cpuid.misaligned_sse",
            "cpuid.sep",
            "cpuid.xsave",
            "cpuid.xsaveopt",
            "cpuid.aes",
            "cpuid.sha",
            "cpuid.adx",
            "cpuid.x86_64",
            "cpuid.fsgsbase",
            "cpuid.pcid",
            "cpuid.smep",
            "cpuid.smap",
            "cpuid.avx_f16c",
            "cpuid.avx_fma",
            "cpu.ignore_bad_msrs",
        ] {
            m.insert(name, SimParam::Bool(true));
        }
        for name in [
            "cpuid.mwait",
            "cpuid.movbe",
            "cpuid.1g_pages",
            "cpuid.fma4",
            "cpuid.xop",
            "cpuid.tbm",
            "cpu.cpuid_limit_winnt",
            "cpu.reset_on_triple_fault",
        ] {
            m.insert(name, SimParam::Bool(false));
        }

        // `cpu.msrs` only has to exist; an empty path means no MSR file.
        m.insert("cpu.msrs", SimParam::Str(String::new()));
        m.insert(
            "cpu.brand_string",
            SimParam::Str("Intel(R) Core(TM) i7-7800X CPU @ 3.50GHz".to_string()),
        );
        m.insert("cpu.add_features", SimParam::Str(String::new()));
        m.insert("cpu.exclude_features", SimParam::Str(String::new()));

        Self { params: m }
    }
}

impl SimParams {
    pub fn get(&self, name: &str) -> Option<&SimParam> {
        let param = self.params.get(name);
        if param.is_none() {
            tracing::warn!(name, "no simulator parameter");
        }
        param
    }

    fn lookup(&self, name: &str) -> Result<&SimParam> {
        self.get(name).ok_or_else(|| BridgeError::UnknownParam {
            name: name.to_string(),
        })
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut SimParam> {
        self.params
            .get_mut(name)
            .ok_or_else(|| BridgeError::UnknownParam {
                name: name.to_string(),
            })
    }

    fn kind_error(name: &str, expected: &'static str) -> BridgeError {
        BridgeError::ParamKind {
            name: name.to_string(),
            expected,
        }
    }

    /// Selected choice of an enum parameter.
    pub fn get_enum(&self, name: &str) -> Result<&'static str> {
        match self.lookup(name)? {
            SimParam::Enum { choices, index } => Ok(choices[*index]),
            _ => Err(Self::kind_error(name, "enum")),
        }
    }

    pub fn get_num(&self, name: &str) -> Result<u64> {
        match self.lookup(name)? {
            SimParam::Num { value, .. } => Ok(*value),
            _ => Err(Self::kind_error(name, "num")),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.lookup(name)? {
            SimParam::Bool(v) => Ok(*v),
            _ => Err(Self::kind_error(name, "bool")),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.lookup(name)? {
            SimParam::Str(v) => Ok(v.as_str()),
            _ => Err(Self::kind_error(name, "string")),
        }
    }

    pub fn set_enum(&mut self, name: &str, choice: &str) -> Result<()> {
        match self.lookup_mut(name)? {
            SimParam::Enum { choices, index } => {
                *index = choices.iter().position(|c| *c == choice).ok_or_else(|| {
                    BridgeError::InvalidChoice {
                        name: name.to_string(),
                        choice: choice.to_string(),
                    }
                })?;
                Ok(())
            }
            _ => Err(Self::kind_error(name, "enum")),
        }
    }

    pub fn set_num(&mut self, name: &str, val: u64) -> Result<()> {
        match self.lookup_mut(name)? {
            SimParam::Num { min, max, value } => {
                if val < *min || val > *max {
                    return Err(BridgeError::ParamOutOfRange {
                        name: name.to_string(),
                        value: val,
                        min: *min,
                        max: *max,
                    });
                }
                *value = val;
                Ok(())
            }
            _ => Err(Self::kind_error(name, "num")),
        }
    }

    pub fn set_bool(&mut self, name: &str, val: bool) -> Result<()> {
        match self.lookup_mut(name)? {
            SimParam::Bool(v) => {
                *v = val;
                Ok(())
            }
            _ => Err(Self::kind_error(name, "bool")),
        }
    }

    pub fn set_str(&mut self, name: &str, val: &str) -> Result<()> {
        match self.lookup_mut(name)? {
            SimParam::Str(v) => {
                *v = val.to_string();
                Ok(())
            }
            _ => Err(Self::kind_error(name, "string")),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.keys().copied()
    }

    /// APIC id mask implied by `cpuid.apic`.
    pub fn apic_id_mask(&self) -> u32 {
        match self.get_enum("cpuid.apic") {
            Ok("legacy") => 0xf,
            _ => 0xff,
        }
    }
}
