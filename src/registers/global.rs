//! 120-bit global bias register.

use bit_field::BitArray;
use serde::Deserialize;

use crate::Error;

/// Length of the global register in bits.
pub const GLOBAL_BITS: usize = 120;
const SLOT_BITS: usize = 6;
const SLOTS: usize = GLOBAL_BITS / SLOT_BITS;
/// Slot holding the two enable bits after the 19 DACs.
const ENABLE_SLOT: usize = 19;

/// Register bit (within a slot) that holds each bit of a DAC value, LSB first.
///
/// The DAC inputs are not wired in binary order; reading the slot back as a plain
/// binary number gives a scrambled value.
const DAC_BIT_ORDER: [usize; SLOT_BITS] = [4, 3, 5, 2, 1, 0];

/// One of the 6-bit bias DACs, in register slot order.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalDac {
    BLRes,
    ThRes,
    VN,
    VN2,
    VNFB,
    VNFoll,
    VNLoad,
    VNDAC,
    ThPRes,
    ThP,
    VNOut,
    VNComp,
    VNCompLd,
    VNCOut1,
    VNCOut2,
    VNCOut3,
    VNBuffer,
    VPFoll,
    VNBias,
}

impl GlobalDac {
    /// Every DAC in register slot order.
    pub const ALL: [GlobalDac; 19] = [
        GlobalDac::BLRes,
        GlobalDac::ThRes,
        GlobalDac::VN,
        GlobalDac::VN2,
        GlobalDac::VNFB,
        GlobalDac::VNFoll,
        GlobalDac::VNLoad,
        GlobalDac::VNDAC,
        GlobalDac::ThPRes,
        GlobalDac::ThP,
        GlobalDac::VNOut,
        GlobalDac::VNComp,
        GlobalDac::VNCompLd,
        GlobalDac::VNCOut1,
        GlobalDac::VNCOut2,
        GlobalDac::VNCOut3,
        GlobalDac::VNBuffer,
        GlobalDac::VPFoll,
        GlobalDac::VNBias,
    ];

    /// Name of the DAC as used in the chip documentation and in run logs.
    pub fn name(&self) -> &'static str {
        match self {
            GlobalDac::BLRes => "BLRes",
            GlobalDac::ThRes => "ThRes",
            GlobalDac::VN => "VN",
            GlobalDac::VN2 => "VN2",
            GlobalDac::VNFB => "VNFB",
            GlobalDac::VNFoll => "VNFoll",
            GlobalDac::VNLoad => "VNLoad",
            GlobalDac::VNDAC => "VNDAC",
            GlobalDac::ThPRes => "ThPRes",
            GlobalDac::ThP => "ThP",
            GlobalDac::VNOut => "VNOut",
            GlobalDac::VNComp => "VNComp",
            GlobalDac::VNCompLd => "VNCompLd",
            GlobalDac::VNCOut1 => "VNCOut1",
            GlobalDac::VNCOut2 => "VNCOut2",
            GlobalDac::VNCOut3 => "VNCOut3",
            GlobalDac::VNBuffer => "VNBuffer",
            GlobalDac::VPFoll => "VPFoll",
            GlobalDac::VNBias => "VNBias",
        }
    }

    /// Look a DAC up by its documented name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dac| dac.name() == name)
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Values for every global bias DAC plus the two feedback enables.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalDacs {
    #[serde(rename = "BLRes")]
    pub bl_res: u8,
    #[serde(rename = "ThRes")]
    pub th_res: u8,
    #[serde(rename = "VN")]
    pub vn: u8,
    #[serde(rename = "VN2")]
    pub vn2: u8,
    #[serde(rename = "VNFB")]
    pub vnfb: u8,
    #[serde(rename = "VNFoll")]
    pub vn_foll: u8,
    #[serde(rename = "VNLoad")]
    pub vn_load: u8,
    #[serde(rename = "VNDAC")]
    pub vn_dac: u8,
    #[serde(rename = "ThPRes")]
    pub thp_res: u8,
    #[serde(rename = "ThP")]
    pub thp: u8,
    #[serde(rename = "VNOut")]
    pub vn_out: u8,
    #[serde(rename = "VNComp")]
    pub vn_comp: u8,
    #[serde(rename = "VNCompLd")]
    pub vn_comp_ld: u8,
    #[serde(rename = "VNCOut1")]
    pub vn_cout1: u8,
    #[serde(rename = "VNCOut2")]
    pub vn_cout2: u8,
    #[serde(rename = "VNCOut3")]
    pub vn_cout3: u8,
    #[serde(rename = "VNBuffer")]
    pub vn_buffer: u8,
    #[serde(rename = "VPFoll")]
    pub vp_foll: u8,
    #[serde(rename = "VNBias")]
    pub vn_bias: u8,
    #[serde(rename = "EnPullUp")]
    pub en_pull_up: bool,
    #[serde(rename = "EnPosFB")]
    pub en_pos_fb: bool,
}

impl Default for GlobalDacs {
    fn default() -> Self {
        Self {
            bl_res: 1,
            th_res: 20,
            vn: 0,
            vn2: 60,
            vnfb: 1,
            vn_foll: 30,
            vn_load: 10,
            vn_dac: 10,
            thp_res: 8,
            thp: 30,
            vn_out: 50,
            vn_comp: 10,
            vn_comp_ld: 5,
            vn_cout1: 5,
            vn_cout2: 5,
            vn_cout3: 5,
            vn_buffer: 30,
            vp_foll: 30,
            vn_bias: 0,
            en_pull_up: false,
            en_pos_fb: false,
        }
    }
}

impl GlobalDacs {
    /// Current value of one DAC.
    pub fn get(&self, dac: GlobalDac) -> u8 {
        *self.field(dac)
    }

    /// Change one DAC, checking it fits in 6 bits.
    pub fn set(&mut self, dac: GlobalDac, value: u8) -> Result<(), Error> {
        if value > 63 {
            return Err(Error::DacOutOfRange {
                dac: dac.name(),
                value,
            });
        }
        *self.field_mut(dac) = value;
        Ok(())
    }

    fn field(&self, dac: GlobalDac) -> &u8 {
        match dac {
            GlobalDac::BLRes => &self.bl_res,
            GlobalDac::ThRes => &self.th_res,
            GlobalDac::VN => &self.vn,
            GlobalDac::VN2 => &self.vn2,
            GlobalDac::VNFB => &self.vnfb,
            GlobalDac::VNFoll => &self.vn_foll,
            GlobalDac::VNLoad => &self.vn_load,
            GlobalDac::VNDAC => &self.vn_dac,
            GlobalDac::ThPRes => &self.thp_res,
            GlobalDac::ThP => &self.thp,
            GlobalDac::VNOut => &self.vn_out,
            GlobalDac::VNComp => &self.vn_comp,
            GlobalDac::VNCompLd => &self.vn_comp_ld,
            GlobalDac::VNCOut1 => &self.vn_cout1,
            GlobalDac::VNCOut2 => &self.vn_cout2,
            GlobalDac::VNCOut3 => &self.vn_cout3,
            GlobalDac::VNBuffer => &self.vn_buffer,
            GlobalDac::VPFoll => &self.vp_foll,
            GlobalDac::VNBias => &self.vn_bias,
        }
    }

    fn field_mut(&mut self, dac: GlobalDac) -> &mut u8 {
        match dac {
            GlobalDac::BLRes => &mut self.bl_res,
            GlobalDac::ThRes => &mut self.th_res,
            GlobalDac::VN => &mut self.vn,
            GlobalDac::VN2 => &mut self.vn2,
            GlobalDac::VNFB => &mut self.vnfb,
            GlobalDac::VNFoll => &mut self.vn_foll,
            GlobalDac::VNLoad => &mut self.vn_load,
            GlobalDac::VNDAC => &mut self.vn_dac,
            GlobalDac::ThPRes => &mut self.thp_res,
            GlobalDac::ThP => &mut self.thp,
            GlobalDac::VNOut => &mut self.vn_out,
            GlobalDac::VNComp => &mut self.vn_comp,
            GlobalDac::VNCompLd => &mut self.vn_comp_ld,
            GlobalDac::VNCOut1 => &mut self.vn_cout1,
            GlobalDac::VNCOut2 => &mut self.vn_cout2,
            GlobalDac::VNCOut3 => &mut self.vn_cout3,
            GlobalDac::VNBuffer => &mut self.vn_buffer,
            GlobalDac::VPFoll => &mut self.vp_foll,
            GlobalDac::VNBias => &mut self.vn_bias,
        }
    }
}

/// Bit model of the global register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalRegister {
    bits: [u8; GLOBAL_BITS / 8],
}

impl GlobalRegister {
    /// Register holding the given DAC values.
    ///
    /// Values are masked to 6 bits; [`GlobalDacs::set`] already rejects larger ones.
    pub fn from_dacs(dacs: &GlobalDacs) -> Self {
        let mut register = Self::default();
        for dac in GlobalDac::ALL {
            register.set_dac(dac, dacs.get(dac));
        }
        register.set_pull_up(dacs.en_pull_up);
        register.set_positive_feedback(dacs.en_pos_fb);
        register
    }

    /// Decode every DAC value from the register bits.
    pub fn to_dacs(&self) -> GlobalDacs {
        let mut dacs = GlobalDacs::default();
        for dac in GlobalDac::ALL {
            *dacs.field_mut(dac) = self.dac(dac);
        }
        dacs.en_pull_up = self.pull_up();
        dacs.en_pos_fb = self.positive_feedback();
        dacs
    }

    /// Write a DAC value into its slot.
    pub fn set_dac(&mut self, dac: GlobalDac, value: u8) {
        let base = dac.slot() * SLOT_BITS;
        for (value_bit, register_bit) in DAC_BIT_ORDER.into_iter().enumerate() {
            let bit = (value >> value_bit) & 1 == 1;
            self.bits[..].set_bit(base + register_bit, bit);
        }
    }

    /// Read a DAC value back from its slot.
    pub fn dac(&self, dac: GlobalDac) -> u8 {
        let base = dac.slot() * SLOT_BITS;
        DAC_BIT_ORDER
            .into_iter()
            .enumerate()
            .filter(|&(_, register_bit)| self.bits[..].get_bit(base + register_bit))
            .fold(0u8, |value, (value_bit, _)| value | (1u8 << value_bit))
    }

    /// Set the `EnPullUp` bit.
    pub fn set_pull_up(&mut self, enabled: bool) {
        self.bits[..].set_bit(ENABLE_SLOT * SLOT_BITS, enabled);
    }

    /// The `EnPullUp` bit.
    pub fn pull_up(&self) -> bool {
        self.bits[..].get_bit(ENABLE_SLOT * SLOT_BITS)
    }

    /// Set the `EnPosFB` bit.
    pub fn set_positive_feedback(&mut self, enabled: bool) {
        self.bits[..].set_bit(ENABLE_SLOT * SLOT_BITS + 1, enabled);
    }

    /// The `EnPosFB` bit.
    pub fn positive_feedback(&self) -> bool {
        self.bits[..].get_bit(ENABLE_SLOT * SLOT_BITS + 1)
    }

    /// Packed register contents, first bit in bit 0 of byte 0.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// The register as twenty 6-character `0`/`1` strings, one per slot.
    pub fn slot_strings(&self) -> Vec<String> {
        let bits = super::bit_string(&self.bits, GLOBAL_BITS);
        super::chunk_string(&bits, [SLOT_BITS; SLOTS])
    }
}
