//! SiFive I2C master (OpenCores `i2c-ocores` layout, 4-byte register stride).
//!
//! The controller moves one byte per command. Every command is followed by a
//! bounded poll of the status register: transfer-in-progress after data and
//! address phases, bus-busy after stop. A set `RXACK` bit after a phase means
//! the addressed device did not acknowledge.
//!
//! Instances come from a fixed pool of [`SIFIVE_I2C_MAX_INSTANCES`] slots
//! that is filled as bus nodes are bound and never emptied.

use lumen_core::sync::{OnceSlot, SpinLock};
use lumen_core::{Error, Result};
use lumen_driver_api::{Capabilities, ControllerFamily, I2cAdapter};
use lumen_mmio::{Mmio, RegisterIo, register_block};

use super::registry::AdapterRegistry;
use super::{I2cDriverEntry, I2cProbeContext};

/// Family tag of SiFive I2C adapters.
pub const FAMILY: ControllerFamily = ControllerFamily::new("sifive,i2c0");

/// Controllers the driver can bind.
pub const SIFIVE_I2C_MAX_INSTANCES: usize = 2;

// ── Registers ───────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u32 {
        /// Interrupt enable.
        const IEN = 1 << 6;
        /// Core enable.
        const EN  = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Command register (write side of offset 0x10).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Command: u32 {
        /// Clear a pending interrupt.
        const IACK = 1 << 0;
        /// Answer a read with NACK when set.
        const ACK  = 1 << 3;
        /// Write a byte.
        const WR   = 1 << 4;
        /// Read a byte.
        const RD   = 1 << 5;
        /// Generate a stop condition.
        const STO  = 1 << 6;
        /// Generate a (repeated) start condition.
        const STA  = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Status register (read side of offset 0x10).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Interrupt pending.
        const IF    = 1 << 0;
        /// Transfer in progress.
        const TIP   = 1 << 1;
        /// Arbitration lost.
        const AL    = 1 << 5;
        /// Bus busy between start and stop.
        const BUSY  = 1 << 6;
        /// No acknowledge received from the device.
        const RXACK = 1 << 7;
    }
}

register_block! {
    /// SiFive I2C master registers.
    pub SifiveI2cRegs {
        /// Clock prescaler, low byte.
        [0x00; u32; rw] prescale_lo,
        /// Clock prescaler, high byte.
        [0x04; u32; rw] prescale_hi,
        /// Core and interrupt enable.
        [0x08; u32; rw] control => Control,
        /// Byte to send in bits 7:0.
        [0x0C; u32; wo] transmit,
        /// Last received byte in bits 7:0.
        [0x0C; u32; ro] receive,
        /// Next bus action.
        [0x10; u32; wo] command => Command,
        /// Transfer and bus state.
        [0x10; u32; ro] status => Status,
    }
}

// ── Engine ──────────────────────────────────────────────────────────────

/// Status polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Status reads before a wait gives up with [`Error::Timeout`].
    pub retries: u32,
}

impl PollPolicy {
    /// Five status reads with no delay between them.
    pub const DEFAULT: Self = Self { retries: 5 };
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const WRITE: u8 = 0;
const READ: u8 = 1;

/// One SiFive I2C controller.
///
/// Transactions on one controller are serialized; a second caller spins
/// until the current start..stop sequence has finished.
pub struct SifiveI2c<I: RegisterIo = Mmio> {
    id: i32,
    regs: SifiveI2cRegs<I>,
    policy: PollPolicy,
    bus: SpinLock<()>,
}

impl<I: RegisterIo> SifiveI2c<I> {
    /// Wraps the controller behind `regs`, registered under `id`.
    pub const fn new(id: i32, regs: SifiveI2cRegs<I>, policy: PollPolicy) -> Self {
        Self {
            id,
            regs,
            policy,
            bus: SpinLock::new(()),
        }
    }

    /// Returns the polling budget.
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Waits until none of `mask` is set in the status register.
    fn poll(&self, mask: Status) -> Result<()> {
        for _ in 0..self.policy.retries {
            if !self.regs.status().intersects(mask) {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        lumen_core::fwtrace!("sifive-i2c{}: {:?} still set after {} polls", self.id, mask, self.policy.retries);
        Err(Error::Timeout)
    }

    fn check_ack(&self) -> Result<()> {
        if self.regs.status().contains(Status::RXACK) {
            lumen_core::fwtrace!("sifive-i2c{}: no ack", self.id);
            return Err(Error::IoError);
        }
        Ok(())
    }

    /// Start condition plus address byte with direction `bit`.
    fn start(&self, address: u8, bit: u8) -> Result<()> {
        self.regs.set_transmit(u32::from((address << 1) | bit));
        self.regs.set_command(Command::STA | Command::WR | Command::IACK);
        self.poll(Status::TIP)?;
        self.check_ack()
    }

    fn write_byte(&self, byte: u8) -> Result<()> {
        self.regs.set_transmit(u32::from(byte));
        self.regs.set_command(Command::WR | Command::IACK);
        self.poll(Status::TIP)?;
        self.check_ack()
    }

    fn stop(&self) -> Result<()> {
        self.regs.set_command(Command::STO | Command::IACK);
        self.poll(Status::BUSY)?;
        self.regs.set_command(Command::IACK);
        Ok(())
    }

    /// Writes `value` to `register` of the device at `address`.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if a wait exhausts the budget, [`Error::IoError`]
    /// on a missing acknowledge. The sequence stops at the first failure.
    pub fn write_reg(&self, address: u8, register: u8, value: u8) -> Result<()> {
        let _bus = self.bus.lock();
        self.start(address, WRITE)?;
        self.write_byte(register)?;
        self.write_byte(value)?;
        self.stop()
    }

    /// Reads `register` of the device at `address`.
    ///
    /// # Errors
    ///
    /// Same as [`write_reg`](Self::write_reg).
    pub fn read_reg(&self, address: u8, register: u8) -> Result<u8> {
        let _bus = self.bus.lock();
        self.start(address, WRITE)?;
        self.write_byte(register)?;
        self.start(address, READ)?;

        self.regs.set_command(Command::ACK | Command::RD | Command::IACK);
        self.poll(Status::TIP)?;
        let [value, ..] = self.regs.receive().to_le_bytes();

        self.stop()?;
        Ok(value)
    }
}

impl<I: RegisterIo + Sync> I2cAdapter for SifiveI2c<I> {
    fn id(&self) -> i32 {
        self.id
    }

    fn family(&self) -> ControllerFamily {
        FAMILY
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn configure(&self) -> Result<()> {
        let _bus = self.bus.lock();
        self.regs.set_control(Control::EN);
        Ok(())
    }

    fn send(&self, address: u8, register: u8, value: u8) -> Result<()> {
        self.write_reg(address, register, value)
    }

    fn read(&self, address: u8, register: u8) -> Result<u8> {
        self.read_reg(address, register)
    }
}

// ── Instance pool ───────────────────────────────────────────────────────

/// Fixed set of controller slots, filled in binding order.
pub struct SifivePool<I: RegisterIo, const N: usize> {
    slots: [OnceSlot<SifiveI2c<I>>; N],
    used: SpinLock<usize>,
}

impl<I: RegisterIo, const N: usize> SifivePool<I, N> {
    /// Creates an empty pool.
    pub const fn new() -> Self {
        Self {
            slots: [const { OnceSlot::new() }; N],
            used: SpinLock::new(0),
        }
    }

    /// Returns `true` once every slot is taken.
    pub fn is_full(&self) -> bool {
        *self.used.lock() >= N
    }

    /// Returns the number of bound controllers.
    pub fn len(&self) -> usize {
        *self.used.lock()
    }

    /// Returns `true` if no controller is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<I: RegisterIo + Send + Sync + 'static, const N: usize> SifivePool<I, N> {
    /// Places a controller for `regs` in the next free slot and registers it
    /// under `id`.
    ///
    /// Registry conflicts are checked first, so a failed claim never uses up
    /// a slot.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfSpace`] if the pool or the registry is full
    /// - [`Error::AlreadyExists`] if `id` is already registered
    pub fn claim(
        &'static self,
        id: i32,
        regs: SifiveI2cRegs<I>,
        policy: PollPolicy,
        registry: &mut AdapterRegistry,
    ) -> Result<&'static SifiveI2c<I>> {
        let mut used = self.used.lock();
        let slot = self.slots.get(*used).ok_or(Error::OutOfSpace)?;
        if registry.find(id).is_some() {
            return Err(Error::AlreadyExists);
        }
        if registry.is_full() {
            return Err(Error::OutOfSpace);
        }

        let controller = slot
            .set(SifiveI2c::new(id, regs, policy))
            .map_err(|_| Error::Failed)?;
        registry.add(Some(controller))?;
        *used += 1;
        Ok(controller)
    }
}

impl<I: RegisterIo, const N: usize> Default for SifivePool<I, N> {
    fn default() -> Self {
        Self::new()
    }
}

static POOL: SifivePool<Mmio, SIFIVE_I2C_MAX_INSTANCES> = SifivePool::new();

// ── Driver entry ────────────────────────────────────────────────────────

/// Catalog entry for SiFive I2C controllers.
pub static SIFIVE_I2C_DRIVER: I2cDriverEntry = I2cDriverEntry {
    name: "sifive-i2c",
    family: FAMILY,
    match_table: &["sifive,i2c0"],
    init: sifive_i2c_init,
};

fn sifive_i2c_init(ctx: &mut I2cProbeContext<'_>) -> Result<()> {
    bind(ctx, &POOL, |base| {
        // SAFETY: `reg` of a "sifive,i2c0" node is the controller's register window.
        unsafe { SifiveI2cRegs::new(base) }
    })
}

/// Binds the bus node in `ctx` to a controller from `pool`, building its
/// register block from the node's first `reg` address.
fn bind<I, const N: usize>(
    ctx: &mut I2cProbeContext<'_>,
    pool: &'static SifivePool<I, N>,
    regs_at: impl FnOnce(usize) -> SifiveI2cRegs<I>,
) -> Result<()>
where
    I: RegisterIo + Send + Sync + 'static,
{
    if pool.is_full() {
        return Err(Error::OutOfSpace);
    }

    let (base, _) = ctx.tree.node_reg(ctx.node, 0)?;
    let base = usize::try_from(base).map_err(|_| Error::InvalidArgument)?;

    pool.claim(ctx.node, regs_at(base), PollPolicy::DEFAULT, ctx.registry)?;
    lumen_core::fwinfo!("sifive-i2c: controller {} at {:#x}", ctx.node, base);
    Ok(())
}

#[cfg(test)]
mod tests {
    use lumen_driver_api::{DeviceTree, NodeOffset};
    use lumen_fdt::Fdt;
    use lumen_fdt::builder::{DtbBuilder, cells};
    use lumen_mmio::mock::{Access, MockIo};

    use super::*;

    const TRANSMIT: usize = 0x0C;
    const COMMAND: usize = 0x10;

    fn controller(mock: &'static MockIo) -> SifiveI2c<&'static MockIo> {
        SifiveI2c::new(0, SifiveI2cRegs::with_io(mock), PollPolicy::DEFAULT)
    }

    fn leak_mock() -> &'static MockIo {
        Box::leak(Box::new(MockIo::new()))
    }

    fn w(offset: usize, value: u64) -> (usize, u64) {
        (offset, value)
    }

    #[test]
    fn send_issues_exact_register_sequence() {
        let mock = leak_mock();
        let ctrl = controller(mock);

        ctrl.write_reg(0x58, 0x00, 0x02).unwrap();
        assert_eq!(
            mock.writes(),
            [
                w(TRANSMIT, 0xB0),
                w(COMMAND, 0x91),
                w(TRANSMIT, 0x00),
                w(COMMAND, 0x11),
                w(TRANSMIT, 0x02),
                w(COMMAND, 0x11),
                w(COMMAND, 0x41),
                w(COMMAND, 0x01),
            ]
        );
    }

    #[test]
    fn read_issues_repeated_start_and_returns_low_byte() {
        let mock = leak_mock();
        mock.push_read(TRANSMIT, 0xABCD_0061);
        let ctrl = controller(mock);

        assert_eq!(ctrl.read_reg(0x58, 0x81), Ok(0x61));
        assert_eq!(
            mock.writes(),
            [
                w(TRANSMIT, 0xB0),
                w(COMMAND, 0x91),
                w(TRANSMIT, 0x81),
                w(COMMAND, 0x11),
                w(TRANSMIT, 0xB1),
                w(COMMAND, 0x91),
                w(COMMAND, 0x29),
                w(COMMAND, 0x41),
                w(COMMAND, 0x01),
            ]
        );
        assert_eq!(mock.reads_at(TRANSMIT), 1);
    }

    #[test]
    fn stuck_transfer_times_out_after_budget() {
        let mock = leak_mock();
        mock.set_default(COMMAND, Status::TIP.bits().into());
        let ctrl = controller(mock);

        assert_eq!(ctrl.write_reg(0x58, 0x00, 0x02), Err(Error::Timeout));
        assert_eq!(mock.reads_at(COMMAND), 5);
        assert_eq!(mock.writes(), [w(TRANSMIT, 0xB0), w(COMMAND, 0x91)]);
    }

    #[test]
    fn poll_succeeds_on_last_allowed_read() {
        let mock = leak_mock();
        let tip = u64::from(Status::TIP.bits());
        mock.push_reads(COMMAND, &[tip, tip, tip, tip, 0]);
        let ctrl = controller(mock);

        assert_eq!(ctrl.poll(Status::TIP), Ok(()));
        assert_eq!(mock.reads_at(COMMAND), 5);
    }

    #[test]
    fn custom_budget_is_honored() {
        let mock = leak_mock();
        mock.set_default(COMMAND, Status::BUSY.bits().into());
        let ctrl = SifiveI2c::new(3, SifiveI2cRegs::with_io(mock), PollPolicy { retries: 9 });

        assert_eq!(ctrl.policy().retries, 9);
        assert_eq!(ctrl.poll(Status::BUSY), Err(Error::Timeout));
        assert_eq!(mock.reads_at(COMMAND), 9);
    }

    #[test]
    fn nack_after_address_is_io_error() {
        let mock = leak_mock();
        mock.set_default(COMMAND, Status::RXACK.bits().into());
        let ctrl = controller(mock);

        assert_eq!(ctrl.read_reg(0x58, 0x81), Err(Error::IoError));
        assert_eq!(mock.writes(), [w(TRANSMIT, 0xB0), w(COMMAND, 0x91)]);
    }

    #[test]
    fn nack_after_address_skips_register_phase() {
        let mock = leak_mock();
        mock.set_default(COMMAND, Status::RXACK.bits().into());
        let ctrl = controller(mock);

        assert_eq!(ctrl.write_reg(0x58, 0x00, 0x02), Err(Error::IoError));
        assert_eq!(mock.writes(), [w(TRANSMIT, 0xB0), w(COMMAND, 0x91)]);
    }

    #[test]
    fn concurrent_sends_do_not_interleave() {
        let mock = leak_mock();
        let ctrl: &'static SifiveI2c<&'static MockIo> = Box::leak(Box::new(controller(mock)));
        let adapter: &'static dyn I2cAdapter = ctrl;

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..50 {
                    adapter.send(0x10, 0x00, 0xAA).unwrap();
                }
            });
            s.spawn(|| {
                for _ in 0..50 {
                    adapter.send(0x20, 0x00, 0x55).unwrap();
                }
            });
        });

        let writes = mock.writes();
        assert_eq!(writes.len(), 100 * 8);
        for group in writes.chunks(8) {
            let value = match group[0] {
                (TRANSMIT, 0x20) => 0xAA,
                (TRANSMIT, 0x40) => 0x55,
                other => panic!("group starts with {other:?}"),
            };
            assert_eq!(
                group,
                [
                    group[0],
                    w(COMMAND, 0x91),
                    w(TRANSMIT, 0x00),
                    w(COMMAND, 0x11),
                    w(TRANSMIT, value),
                    w(COMMAND, 0x11),
                    w(COMMAND, 0x41),
                    w(COMMAND, 0x01),
                ]
            );
        }
    }

    #[test]
    fn stop_waits_for_bus_release() {
        let mock = leak_mock();
        // Three phases pass, then BUSY never clears.
        mock.push_reads(COMMAND, &[0; 6]);
        mock.set_default(COMMAND, Status::BUSY.bits().into());
        let ctrl = controller(mock);

        assert_eq!(ctrl.write_reg(0x58, 0x00, 0x02), Err(Error::Timeout));
        assert_eq!(mock.writes().last(), Some(&w(COMMAND, 0x41)));
    }

    #[test]
    fn configure_enables_core() {
        let mock = leak_mock();
        let ctrl = controller(mock);

        ctrl.configure().unwrap();
        assert_eq!(
            mock.accesses(),
            [Access::Write {
                offset: 0x08,
                value: 0x80
            }]
        );
        assert_eq!(ctrl.capabilities(), Capabilities::all());
        assert_eq!(ctrl.family(), FAMILY);
    }

    fn three_bus_dtb() -> Vec<u8> {
        let mut b = DtbBuilder::default();
        b.begin("");
        for base in [0x1003_0000u32, 0x1003_1000, 0x1003_2000] {
            b.begin(&format!("i2c@{base:x}"))
                .prop_str("compatible", "sifive,i2c0")
                .prop("reg", &cells(&[0x0, base, 0x1000]))
                .end();
        }
        b.end();
        b.finish()
    }

    fn buses(fdt: &Fdt<'_>) -> Vec<NodeOffset> {
        fdt.root()
            .children()
            .map(|n| n.offset() as NodeOffset)
            .collect()
    }

    fn bind_mock(
        tree: &dyn DeviceTree,
        node: NodeOffset,
        pool: &'static SifivePool<&'static MockIo, SIFIVE_I2C_MAX_INSTANCES>,
        registry: &mut AdapterRegistry,
    ) -> Result<()> {
        let mut ctx = I2cProbeContext {
            tree,
            node,
            matched: "sifive,i2c0",
            registry,
        };
        bind(&mut ctx, pool, |_| SifiveI2cRegs::with_io(leak_mock()))
    }

    #[test]
    fn third_controller_is_out_of_space() {
        let pool: &'static SifivePool<_, SIFIVE_I2C_MAX_INSTANCES> = Box::leak(Box::new(SifivePool::new()));
        let mut registry = AdapterRegistry::new();
        let dtb = three_bus_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let [a, b, c] = buses(&fdt)[..] else {
            panic!("expected three buses");
        };

        bind_mock(&fdt, a, pool, &mut registry).unwrap();
        bind_mock(&fdt, b, pool, &mut registry).unwrap();
        assert_eq!(bind_mock(&fdt, c, pool, &mut registry), Err(Error::OutOfSpace));
        assert_eq!(pool.len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.find(b).map(|x| x.id()), Some(b));
    }

    #[test]
    fn duplicate_bind_keeps_slot_free() {
        let pool: &'static SifivePool<_, SIFIVE_I2C_MAX_INSTANCES> = Box::leak(Box::new(SifivePool::new()));
        let mut registry = AdapterRegistry::new();
        let dtb = three_bus_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let nodes = buses(&fdt);

        bind_mock(&fdt, nodes[0], pool, &mut registry).unwrap();
        assert_eq!(
            bind_mock(&fdt, nodes[0], pool, &mut registry),
            Err(Error::AlreadyExists)
        );
        assert_eq!(pool.len(), 1);
        bind_mock(&fdt, nodes[1], pool, &mut registry).unwrap();
        assert!(pool.is_full());
    }

    #[test]
    fn missing_reg_is_not_found() {
        let mut b = DtbBuilder::default();
        b.begin("")
            .begin("i2c")
            .prop_str("compatible", "sifive,i2c0")
            .end()
            .end();
        let dtb = b.finish();
        let fdt = Fdt::parse(&dtb).unwrap();
        let pool: &'static SifivePool<_, SIFIVE_I2C_MAX_INSTANCES> = Box::leak(Box::new(SifivePool::new()));
        let mut registry = AdapterRegistry::new();

        let node = buses(&fdt)[0];
        assert_eq!(bind_mock(&fdt, node, pool, &mut registry), Err(Error::NotFound));
        assert!(pool.is_empty());
        assert!(registry.is_empty());
    }
}
