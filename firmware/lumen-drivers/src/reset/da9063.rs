//! Dialog DA9063 PMIC as a system reset device.
//!
//! The PMIC sits on an I2C bus; its node's parent is the bus node and its
//! `reg` is the 7-bit bus address. Every chip access goes through the I2C
//! registry dispatch on the adapter resolved at probe time.

use lumen_core::sync::SpinLock;
use lumen_core::{Error, Result};
use lumen_driver_api::{I2cAdapter, ResetReason, ResetType, SystemResetDevice};

use super::{ResetDriverEntry, ResetProbeContext};
use crate::i2c;

const REG_PAGE_CON: u8 = 0x00;
const REG_CONTROL_A: u8 = 0x0E;
const REG_CONTROL_F: u8 = 0x13;
const REG_DEVICE_ID: u8 = 0x81;

const CONTROL_A_M_POWER1_EN: u8 = 1 << 6;
const CONTROL_A_M_POWER_EN: u8 = 1 << 5;
const CONTROL_A_STANDBY: u8 = 1 << 3;

const CONTROL_F_WAKEUP: u8 = 1 << 2;
const CONTROL_F_SHUTDOWN: u8 = 1 << 1;

/// Page selected during the identity check.
const PROBE_PAGE: u8 = 0x02;

/// `DEVICE_ID` value of a DA9063.
pub const CHIP_ID: u8 = 0x61;

/// Where the PMIC lives: its bus adapter and its address on that bus.
#[derive(Clone, Copy)]
pub struct PmicBinding {
    /// Adapter of the parent bus.
    pub adapter: &'static dyn I2cAdapter,
    /// 7-bit device address.
    pub address: u8,
}

impl PmicBinding {
    fn write(&self, register: u8, value: u8) -> Result<()> {
        i2c::send(Some(self.adapter), self.address, register, value)
    }

    fn read(&self, register: u8) -> Result<u8> {
        i2c::read(Some(self.adapter), self.address, register)
    }

    /// Confirms a DA9063 answers at the bound address.
    ///
    /// Selects page 2, reads the page register back and checks the device id.
    fn check_identity(&self) -> Result<()> {
        self.write(REG_PAGE_CON, PROBE_PAGE)?;
        if self.read(REG_PAGE_CON)? != PROBE_PAGE {
            return Err(Error::NoSuchDevice);
        }
        if self.read(REG_DEVICE_ID)? != CHIP_ID {
            return Err(Error::NoSuchDevice);
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.write(REG_PAGE_CON, 0x00)?;
        self.write(REG_CONTROL_F, CONTROL_F_SHUTDOWN)
    }

    fn reboot(&self) -> Result<()> {
        self.write(REG_PAGE_CON, 0x00)?;
        self.write(REG_CONTROL_F, CONTROL_F_WAKEUP)?;
        self.write(
            REG_CONTROL_A,
            CONTROL_A_M_POWER1_EN | CONTROL_A_M_POWER_EN | CONTROL_A_STANDBY,
        )
    }

    fn run(&self, kind: ResetType) -> Result<()> {
        match kind {
            ResetType::Shutdown => self.shutdown(),
            ResetType::ColdReboot | ResetType::WarmReboot => self.reboot(),
        }
    }
}

/// DA9063 reset device state.
pub struct Da9063 {
    binding: SpinLock<Option<PmicBinding>>,
}

impl Da9063 {
    /// Creates an unbound device.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            binding: SpinLock::new(None),
        }
    }

    /// Points the device at a PMIC.
    pub fn bind(&self, binding: PmicBinding) {
        *self.binding.lock() = Some(binding);
    }

    /// Returns the current binding.
    #[must_use]
    pub fn binding(&self) -> Option<PmicBinding> {
        *self.binding.lock()
    }

    /// Configures the bus, checks the chip identity and returns the binding
    /// to drive.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] when unbound, [`Error::NoSuchDevice`] when the
    /// chip is not a DA9063, or the bus error that interrupted the check.
    pub fn identify(&self) -> Result<PmicBinding> {
        let pmic = self.binding().ok_or(Error::NotSupported)?;
        // May include clock setup; a failure shows up in the identity check.
        let _ = i2c::configure(Some(pmic.adapter));
        pmic.check_identity()?;
        Ok(pmic)
    }

    /// Runs the register sequence for `kind` without waiting for power to
    /// drop.
    ///
    /// # Errors
    ///
    /// Any error from [`identify`](Self::identify), or the bus error that
    /// cut the sequence short.
    pub fn perform(&self, kind: ResetType) -> Result<()> {
        self.identify()?.run(kind)
    }
}

impl Default for Da9063 {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemResetDevice for Da9063 {
    fn name(&self) -> &'static str {
        "da9063-reset"
    }

    fn can_handle(&self, kind: ResetType, _reason: ResetReason) -> bool {
        self.binding().is_some()
            && matches!(
                kind,
                ResetType::Shutdown | ResetType::ColdReboot | ResetType::WarmReboot
            )
    }

    fn reset(&self, kind: ResetType, _reason: ResetReason) -> ! {
        match self.identify() {
            Ok(pmic) => {
                if let Err(e) = pmic.run(kind) {
                    lumen_core::fwerr!("da9063: {:?} sequence failed: {}", kind, e);
                }
            }
            Err(e) => lumen_core::fwwarn!("da9063: chip is not da9063 PMIC ({})", e),
        }
        // Power drops once the PMIC acts on the sequence.
        super::park()
    }
}

static DA9063: Da9063 = Da9063::new();

/// Catalog entry for DA9063 PMICs.
pub static DA9063_RESET_DRIVER: ResetDriverEntry = ResetDriverEntry {
    name: "da9063-reset",
    match_table: &["dlg,da9063"],
    init: da9063_init,
};

fn da9063_init(ctx: &ResetProbeContext<'_>) -> Result<&'static dyn SystemResetDevice> {
    bind(ctx, &DA9063)?;
    Ok(&DA9063)
}

fn bind(ctx: &ResetProbeContext<'_>, device: &Da9063) -> Result<()> {
    let bus = ctx.tree.parent_offset(ctx.node)?;
    let adapter = ctx.i2c.get_adapter(ctx.tree, bus)?;

    let (address, _) = ctx.tree.node_reg(ctx.node, 0)?;
    let address = u8::try_from(address)
        .ok()
        .filter(|a| *a <= 0x7F)
        .ok_or(Error::InvalidArgument)?;

    device.bind(PmicBinding { adapter, address });
    lumen_core::fwinfo!("da9063: PMIC at {:#04x} on i2c adapter {}", address, bus);
    Ok(())
}

#[cfg(test)]
mod tests {
    use lumen_driver_api::{Capabilities, ControllerFamily};
    use lumen_fdt::Fdt;
    use lumen_fdt::builder::{DtbBuilder, cells};

    use super::*;
    use crate::i2c::{I2cDriverEntry, I2cProbeContext, I2cSubsystem};
    use crate::reset::ResetFacility;

    const FAKE_FAMILY: ControllerFamily = ControllerFamily::new("test,pmic-bus");

    struct State {
        regs: [u8; 256],
        sends: Vec<(u8, u8, u8)>,
        configured: usize,
        page_sticks: bool,
        fail_send_to: Option<u8>,
    }

    /// Bus adapter with one PMIC behind it, modelled as a flat register file.
    struct FakeBus {
        id: i32,
        state: SpinLock<State>,
    }

    impl FakeBus {
        fn leak(id: i32, chip_id: u8) -> &'static Self {
            let mut regs = [0; 256];
            regs[usize::from(REG_DEVICE_ID)] = chip_id;
            Box::leak(Box::new(Self {
                id,
                state: SpinLock::new(State {
                    regs,
                    sends: Vec::new(),
                    configured: 0,
                    page_sticks: true,
                    fail_send_to: None,
                }),
            }))
        }

        fn sends(&self) -> Vec<(u8, u8, u8)> {
            self.state.lock().sends.clone()
        }
    }

    impl I2cAdapter for FakeBus {
        fn id(&self) -> i32 {
            self.id
        }
        fn family(&self) -> ControllerFamily {
            FAKE_FAMILY
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::all()
        }
        fn configure(&self) -> Result<()> {
            self.state.lock().configured += 1;
            Err(Error::Timeout)
        }
        fn send(&self, address: u8, register: u8, value: u8) -> Result<()> {
            let mut state = self.state.lock();
            if state.fail_send_to == Some(register) {
                return Err(Error::IoError);
            }
            state.sends.push((address, register, value));
            if register != REG_PAGE_CON || state.page_sticks {
                state.regs[usize::from(register)] = value;
            }
            Ok(())
        }
        fn read(&self, _address: u8, register: u8) -> Result<u8> {
            Ok(self.state.lock().regs[usize::from(register)])
        }
    }

    fn bound(bus: &'static FakeBus) -> Da9063 {
        let pmic = Da9063::new();
        pmic.bind(PmicBinding {
            adapter: bus,
            address: 0x58,
        });
        pmic
    }

    #[test]
    fn shutdown_sequence() {
        let bus = FakeBus::leak(1, CHIP_ID);
        let pmic = bound(bus);

        assert_eq!(pmic.perform(ResetType::Shutdown), Ok(()));
        assert_eq!(
            bus.sends(),
            [(0x58, 0x00, 0x02), (0x58, 0x00, 0x00), (0x58, 0x13, 0x02)]
        );
        assert_eq!(bus.state.lock().configured, 1);
    }

    #[test]
    fn reboot_sequence_for_cold_and_warm() {
        for kind in [ResetType::ColdReboot, ResetType::WarmReboot] {
            let bus = FakeBus::leak(1, CHIP_ID);
            let pmic = bound(bus);

            assert_eq!(pmic.perform(kind), Ok(()));
            assert_eq!(
                bus.sends(),
                [
                    (0x58, 0x00, 0x02),
                    (0x58, 0x00, 0x00),
                    (0x58, 0x13, 0x04),
                    (0x58, 0x0E, 0x68),
                ]
            );
        }
    }

    #[test]
    fn wrong_chip_id_touches_nothing_else() {
        let bus = FakeBus::leak(1, 0x62);
        let pmic = bound(bus);

        assert_eq!(pmic.perform(ResetType::Shutdown), Err(Error::NoSuchDevice));
        assert_eq!(bus.sends(), [(0x58, 0x00, 0x02)]);
    }

    #[test]
    fn page_readback_mismatch_is_no_such_device() {
        let bus = FakeBus::leak(1, CHIP_ID);
        bus.state.lock().page_sticks = false;
        let pmic = bound(bus);

        assert_eq!(pmic.identify().err(), Some(Error::NoSuchDevice));
    }

    #[test]
    fn sequence_stops_at_first_bus_error() {
        let bus = FakeBus::leak(1, CHIP_ID);
        bus.state.lock().fail_send_to = Some(REG_CONTROL_F);
        let pmic = bound(bus);

        assert_eq!(pmic.perform(ResetType::ColdReboot), Err(Error::IoError));
        assert_eq!(bus.sends(), [(0x58, 0x00, 0x02), (0x58, 0x00, 0x00)]);
    }

    #[test]
    fn unbound_device_refuses() {
        let pmic = Da9063::new();
        assert!(!pmic.can_handle(ResetType::Shutdown, ResetReason::NoReason));
        assert_eq!(pmic.perform(ResetType::Shutdown), Err(Error::NotSupported));

        let bus = FakeBus::leak(1, CHIP_ID);
        let pmic = bound(bus);
        assert!(pmic.can_handle(ResetType::WarmReboot, ResetReason::SystemFailure));
    }

    fn fake_bus_init(ctx: &mut I2cProbeContext<'_>) -> Result<()> {
        ctx.registry.add(Some(FakeBus::leak(ctx.node, CHIP_ID)))
    }

    static FAKE_BUS_DRIVER: I2cDriverEntry = I2cDriverEntry {
        name: "fake-bus",
        family: FAKE_FAMILY,
        match_table: &["test,pmic-bus"],
        init: fake_bus_init,
    };

    fn board_dtb(bus_compatible: &str) -> Vec<u8> {
        let mut b = DtbBuilder::default();
        b.begin("")
            .begin("i2c@10030000")
            .prop_str("compatible", bus_compatible)
            .prop("reg", &cells(&[0x0, 0x1003_0000, 0x1000]))
            .prop_u32("#address-cells", 1)
            .prop_u32("#size-cells", 0)
            .begin("pmic@58")
            .prop_str("compatible", "dlg,da9063")
            .prop_u32("reg", 0x58)
            .end()
            .end()
            .end();
        b.finish()
    }

    #[test]
    fn probe_binds_pmic_through_parent_bus() {
        static I2C_CATALOG: &[&I2cDriverEntry] = &[&FAKE_BUS_DRIVER];
        static RESET_CATALOG: &[&ResetDriverEntry] = &[&DA9063_RESET_DRIVER];
        let i2c = I2cSubsystem::new(I2C_CATALOG);
        let facility = ResetFacility::new(RESET_CATALOG);
        let dtb = board_dtb("test,pmic-bus");
        let fdt = Fdt::parse(&dtb).unwrap();
        let bus = fdt.find_node("/i2c@10030000").unwrap().offset() as i32;

        assert_eq!(facility.probe_all(&fdt, &i2c), Ok(1));
        assert_eq!(facility.device().map(|d| d.name()), Some("da9063-reset"));

        let binding = DA9063.binding().unwrap();
        assert_eq!(binding.address, 0x58);
        assert_eq!(binding.adapter.id(), bus);
        assert_eq!(i2c.adapter_count(), 1);
    }

    #[test]
    fn pmic_on_unknown_bus_fails_probe() {
        static I2C_CATALOG: &[&I2cDriverEntry] = &[&FAKE_BUS_DRIVER];
        let i2c = I2cSubsystem::new(I2C_CATALOG);
        let dtb = board_dtb("vendor,unknown-i2c");
        let fdt = Fdt::parse(&dtb).unwrap();
        let node = fdt.find_node("/i2c@10030000/pmic@58").unwrap().offset() as i32;

        let ctx = ResetProbeContext {
            tree: &fdt,
            node,
            matched: "dlg,da9063",
            i2c: &i2c,
        };
        let local = Da9063::new();
        assert_eq!(bind(&ctx, &local), Err(Error::NotImplemented));
        assert!(local.binding().is_none());
    }

    #[test]
    fn oversized_bus_address_is_rejected() {
        static I2C_CATALOG: &[&I2cDriverEntry] = &[&FAKE_BUS_DRIVER];
        let i2c = I2cSubsystem::new(I2C_CATALOG);
        let mut b = DtbBuilder::default();
        b.begin("")
            .begin("i2c")
            .prop_str("compatible", "test,pmic-bus")
            .prop_u32("#address-cells", 1)
            .prop_u32("#size-cells", 0)
            .begin("pmic")
            .prop_str("compatible", "dlg,da9063")
            .prop_u32("reg", 0x158)
            .end()
            .end()
            .end();
        let dtb = b.finish();
        let fdt = Fdt::parse(&dtb).unwrap();
        let node = fdt.find_node("/i2c/pmic").unwrap().offset() as i32;

        let ctx = ResetProbeContext {
            tree: &fdt,
            node,
            matched: "dlg,da9063",
            i2c: &i2c,
        };
        let local = Da9063::new();
        assert_eq!(bind(&ctx, &local), Err(Error::InvalidArgument));
    }
}
