// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Portable binary codec.
//!
//! Geometry and topology files store every fixed-width number in one of two
//! file byte orders (big or little endian), recorded in the file header. The
//! host layout is not assumed to be either: [`detect_native_layout`] encodes a
//! test value of each type natively and locates every byte of the canonical
//! (big-endian) pattern in it. The resulting permutation tables convert
//! between native and file bytes on any byte order, including mixed ones.
//!
//! The detected layout is computed once per process ([`native_layout`]); all
//! conversions after that are pure functions of the cached tables.

use std::io::{Read, Write};
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// On-disk width of a double.
pub const PORT_DOUBLE: usize = 8;
/// On-disk width of a float.
pub const PORT_FLOAT: usize = 4;
/// On-disk width of a long.
pub const PORT_LONG: usize = 4;
/// On-disk width of an int (primitive ids and counts).
pub const PORT_INT: usize = 4;
/// On-disk width of a short.
pub const PORT_SHORT: usize = 2;
/// Maximum on-disk width of a file offset.
pub const PORT_OFF_T: usize = 8;
/// Largest offset representable in a 4-byte offset field.
pub const PORT_LONG_MAX: u64 = i32::MAX as u64;

const DBL_TEST: f64 = 1.3333;
const FLT_TEST: f32 = 1.3333;
const LNG_TEST: i32 = 0x0102_0304;
const INT_TEST: i32 = 0x0102_0304;
const SHRT_TEST: i16 = 0x0102;
const OFF_TEST: i64 = 0x0102_0304_0506_0708;

// Canonical (big-endian) encodings of the test values.
const DBL_CMPR: [u8; 8] = [0x3f, 0xf5, 0x55, 0x32, 0x61, 0x7c, 0x1b, 0xda];
const FLT_CMPR: [u8; 4] = [0x3f, 0xaa, 0xa9, 0x93];
const LNG_CMPR: [u8; 4] = [0x01, 0x02, 0x03, 0x04];
const INT_CMPR: [u8; 4] = [0x01, 0x02, 0x03, 0x04];
const SHRT_CMPR: [u8; 2] = [0x01, 0x02];
const OFF_CMPR: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

/// Byte order of a native layout or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ByteOrder {
    Big,
    Little,
    /// Neither identity nor reversed (mixed-endian host). Never a file order.
    Other,
}

impl ByteOrder {
    /// Code stored in file headers.
    pub fn store_code(self) -> u8 {
        match self {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
            ByteOrder::Other => 2,
        }
    }

    pub fn from_store_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ByteOrder::Little),
            1 => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

/// Permutation table: `pos[i]` is the native byte offset holding canonical byte `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permutation<const N: usize> {
    pos: [usize; N],
    order: ByteOrder,
}

impl<const N: usize> Permutation<N> {
    /// Locates every canonical byte in a native encoding.
    fn locate(kind: &'static str, native: [u8; N], canonical: [u8; N]) -> Result<Self> {
        let mut pos = [0usize; N];
        for (i, byte) in canonical.iter().enumerate() {
            pos[i] = native
                .iter()
                .position(|b| b == byte)
                .ok_or(Error::NonConformingLayout(kind))?;
        }
        Ok(Self::from_positions(pos))
    }

    /// Builds a table from explicit positions and classifies its order.
    pub fn from_positions(pos: [usize; N]) -> Self {
        let order = if pos.iter().enumerate().all(|(i, &p)| p == i) {
            ByteOrder::Big
        } else if pos.iter().enumerate().all(|(i, &p)| p == N - 1 - i) {
            ByteOrder::Little
        } else {
            ByteOrder::Other
        };
        Self { pos, order }
    }

    fn for_order(order: ByteOrder) -> Self {
        let mut pos = [0usize; N];
        for (i, p) in pos.iter_mut().enumerate() {
            *p = match order {
                ByteOrder::Little => N - 1 - i,
                _ => i,
            };
        }
        Self::from_positions(pos)
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Native bytes to canonical (big-endian) bytes.
    pub fn to_canonical(&self, native: [u8; N]) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, b) in out.iter_mut().enumerate() {
            *b = native[self.pos[i]];
        }
        out
    }

    /// Canonical (big-endian) bytes to native bytes.
    pub fn from_canonical(&self, canonical: [u8; N]) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, &b) in canonical.iter().enumerate() {
            out[self.pos[i]] = b;
        }
        out
    }
}

/// Permutation tables for every port type on one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeLayout {
    pub dbl: Permutation<8>,
    pub flt: Permutation<4>,
    pub lng: Permutation<4>,
    pub int: Permutation<4>,
    pub shrt: Permutation<2>,
    pub off: Permutation<8>,
}

impl NativeLayout {
    /// Layout of a simulated host with a uniform byte order.
    pub fn simulated(order: ByteOrder) -> Self {
        Self {
            dbl: Permutation::for_order(order),
            flt: Permutation::for_order(order),
            lng: Permutation::for_order(order),
            int: Permutation::for_order(order),
            shrt: Permutation::for_order(order),
            off: Permutation::for_order(order),
        }
    }

    /// Byte order of doubles, used as the host's representative order.
    pub fn order(&self) -> ByteOrder {
        self.dbl.order()
    }

    /// Byte order new files are written in: native when it is big or little.
    pub fn preferred_file_order(&self) -> ByteOrder {
        match self.order() {
            ByteOrder::Little => ByteOrder::Little,
            _ => ByteOrder::Big,
        }
    }
}

fn check_size(kind: &'static str, native: usize, portable: usize) -> Result<()> {
    if native != portable {
        return Err(Error::PortSize {
            kind,
            native,
            portable,
        });
    }
    Ok(())
}

/// Detects the host layout of every port type.
///
/// Fails if a host primitive does not have the fixed on-disk width or if a
/// byte of the canonical test pattern cannot be found in the native encoding.
pub fn detect_native_layout() -> Result<NativeLayout> {
    check_size("double", std::mem::size_of::<f64>(), PORT_DOUBLE)?;
    check_size("float", std::mem::size_of::<f32>(), PORT_FLOAT)?;
    check_size("long", std::mem::size_of::<i32>(), PORT_LONG)?;
    check_size("int", std::mem::size_of::<i32>(), PORT_INT)?;
    check_size("short", std::mem::size_of::<i16>(), PORT_SHORT)?;
    check_size("off_t", std::mem::size_of::<i64>(), PORT_OFF_T)?;

    let layout = NativeLayout {
        dbl: Permutation::locate("double", DBL_TEST.to_ne_bytes(), DBL_CMPR)?,
        flt: Permutation::locate("float", FLT_TEST.to_ne_bytes(), FLT_CMPR)?,
        lng: Permutation::locate("long", LNG_TEST.to_ne_bytes(), LNG_CMPR)?,
        int: Permutation::locate("int", INT_TEST.to_ne_bytes(), INT_CMPR)?,
        shrt: Permutation::locate("short", SHRT_TEST.to_ne_bytes(), SHRT_CMPR)?,
        off: Permutation::locate("off_t", OFF_TEST.to_ne_bytes(), OFF_CMPR)?,
    };
    tracing::debug!(order = ?layout.order(), "detected native byte layout");
    Ok(layout)
}

/// Cached copy of the layout fault, `Error` itself is not `Clone`.
#[derive(Debug, Clone, Copy)]
enum LayoutFault {
    Size {
        kind: &'static str,
        native: usize,
        portable: usize,
    },
    Pattern(&'static str),
}

static NATIVE: OnceLock<std::result::Result<NativeLayout, LayoutFault>> = OnceLock::new();

/// Process-wide native layout, detected on first use.
pub fn native_layout() -> Result<NativeLayout> {
    let cached = NATIVE.get_or_init(|| {
        detect_native_layout().map_err(|e| match e {
            Error::PortSize {
                kind,
                native,
                portable,
            } => LayoutFault::Size {
                kind,
                native,
                portable,
            },
            Error::NonConformingLayout(kind) => LayoutFault::Pattern(kind),
            _ => LayoutFault::Pattern("unknown"),
        })
    });
    match *cached {
        Ok(layout) => Ok(layout),
        Err(LayoutFault::Size {
            kind,
            native,
            portable,
        }) => Err(Error::PortSize {
            kind,
            native,
            portable,
        }),
        Err(LayoutFault::Pattern(kind)) => Err(Error::NonConformingLayout(kind)),
    }
}

/// Conversion between one host layout and one file byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortInfo {
    layout: NativeLayout,
    file_order: ByteOrder,
    /// Layout is the running host's: native bytes come from `to_ne_bytes`.
    host: bool,
}

macro_rules! port_codec {
    ($encode:ident, $decode:ident, $ty:ty, $field:ident, $n:expr) => {
        pub fn $encode(&self, v: $ty) -> [u8; $n] {
            let native = if self.host {
                v.to_ne_bytes()
            } else {
                self.layout.$field.from_canonical(v.to_be_bytes())
            };
            self.to_file(&self.layout.$field, native)
        }

        pub fn $decode(&self, b: [u8; $n]) -> $ty {
            let native = self.from_file(&self.layout.$field, b);
            if self.host {
                <$ty>::from_ne_bytes(native)
            } else {
                <$ty>::from_be_bytes(self.layout.$field.to_canonical(native))
            }
        }
    };
}

impl PortInfo {
    /// Codec for the current host and the given file order.
    pub fn new(file_order: ByteOrder) -> Result<Self> {
        let mut port = Self::with_layout(native_layout()?, file_order);
        port.host = true;
        Ok(port)
    }

    /// Codec for the current host writing in its preferred order.
    pub fn native() -> Result<Self> {
        let layout = native_layout()?;
        Self::new(layout.preferred_file_order())
    }

    /// Codec for an explicit, simulated host layout.
    ///
    /// Native bytes are synthesized from the layout's tables instead of the
    /// running host. `ByteOrder::Other` is not a valid file order and is
    /// treated as big endian.
    pub fn with_layout(layout: NativeLayout, file_order: ByteOrder) -> Self {
        let file_order = match file_order {
            ByteOrder::Other => ByteOrder::Big,
            o => o,
        };
        Self {
            layout,
            file_order,
            host: false,
        }
    }

    pub fn file_order(&self) -> ByteOrder {
        self.file_order
    }

    pub fn layout(&self) -> &NativeLayout {
        &self.layout
    }

    /// Same host layout, different file order.
    pub fn with_file_order(&self, file_order: ByteOrder) -> Self {
        let mut port = Self::with_layout(self.layout, file_order);
        port.host = self.host;
        port
    }

    fn to_file<const N: usize>(&self, perm: &Permutation<N>, native: [u8; N]) -> [u8; N] {
        let mut canonical = perm.to_canonical(native);
        if self.file_order == ByteOrder::Little {
            canonical.reverse();
        }
        canonical
    }

    fn from_file<const N: usize>(&self, perm: &Permutation<N>, mut file: [u8; N]) -> [u8; N] {
        if self.file_order == ByteOrder::Little {
            file.reverse();
        }
        perm.from_canonical(file)
    }

    /// Native bytes of a double as this codec's host lays them out.
    pub fn native_f64(&self, v: f64) -> [u8; 8] {
        if self.host {
            v.to_ne_bytes()
        } else {
            self.layout.dbl.from_canonical(v.to_be_bytes())
        }
    }

    port_codec!(encode_f64, decode_f64, f64, dbl, 8);
    port_codec!(encode_f32, decode_f32, f32, flt, 4);
    port_codec!(encode_long, decode_long, i32, lng, 4);
    port_codec!(encode_int, decode_int, i32, int, 4);
    port_codec!(encode_short, decode_short, i16, shrt, 2);
    port_codec!(encode_off64, decode_off64, i64, off, 8);

    /// Encodes an offset in a field of `width` bytes (4 or 8).
    pub fn encode_off(&self, v: u64, width: usize) -> Result<Vec<u8>> {
        if width == 4 {
            if v > PORT_LONG_MAX {
                return Err(Error::OffsetOverflow(v, width));
            }
            Ok(self.encode_long(v as i32).to_vec())
        } else {
            Ok(self.encode_off64(v as i64).to_vec())
        }
    }

    /// Decodes an offset field of 4 or 8 bytes.
    pub fn decode_off(&self, b: &[u8]) -> Result<u64> {
        match b.len() {
            4 => {
                let mut arr = [0u8; 4];
                arr.copy_from_slice(b);
                Ok(self.decode_long(arr) as u32 as u64)
            }
            8 => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                Ok(self.decode_off64(arr) as u64)
            }
            n => Err(Error::Truncated {
                expected: PORT_OFF_T,
                got: n,
            }),
        }
    }
}

/// Writes port-encoded values to a byte sink, tracking the position.
#[derive(Debug)]
pub struct PortWriter<W> {
    inner: W,
    port: PortInfo,
    position: u64,
}

impl<W: Write> PortWriter<W> {
    pub fn new(inner: W, port: PortInfo) -> Self {
        Self {
            inner,
            port,
            position: 0,
        }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn port(&self) -> &PortInfo {
        &self.port
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_bytes(&mut self, b: &[u8]) -> Result<()> {
        self.inner.write_all(b)?;
        self.position += b.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        let b = self.port.encode_f64(v);
        self.write_bytes(&b)
    }

    pub fn write_f64s(&mut self, vs: &[f64]) -> Result<()> {
        for &v in vs {
            self.write_f64(v)?;
        }
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        let b = self.port.encode_f32(v);
        self.write_bytes(&b)
    }

    pub fn write_long(&mut self, v: i32) -> Result<()> {
        let b = self.port.encode_long(v);
        self.write_bytes(&b)
    }

    pub fn write_int(&mut self, v: i32) -> Result<()> {
        let b = self.port.encode_int(v);
        self.write_bytes(&b)
    }

    pub fn write_ints(&mut self, vs: &[i32]) -> Result<()> {
        for &v in vs {
            self.write_int(v)?;
        }
        Ok(())
    }

    pub fn write_short(&mut self, v: i16) -> Result<()> {
        let b = self.port.encode_short(v);
        self.write_bytes(&b)
    }

    pub fn write_off(&mut self, v: u64, width: usize) -> Result<()> {
        let b = self.port.encode_off(v, width)?;
        self.write_bytes(&b)
    }
}

/// Reads port-encoded values from a byte source.
#[derive(Debug)]
pub struct PortReader<R> {
    inner: R,
    port: PortInfo,
    position: u64,
}

impl<R: Read> PortReader<R> {
    pub fn new(inner: R, port: PortInfo) -> Self {
        Self {
            inner,
            port,
            position: 0,
        }
    }

    /// Switches the file byte order, typically after reading a header.
    pub fn set_port(&mut self, port: PortInfo) {
        self.port = port;
    }

    pub fn port(&self) -> &PortInfo {
        &self.port
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(Error::Truncated {
                        expected: buf.len(),
                        got: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.position += buf.len() as u64;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        let b = self.read_array::<8>()?;
        Ok(self.port.decode_f64(b))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.read_array::<4>()?;
        Ok(self.port.decode_f32(b))
    }

    pub fn read_long(&mut self) -> Result<i32> {
        let b = self.read_array::<4>()?;
        Ok(self.port.decode_long(b))
    }

    pub fn read_int(&mut self) -> Result<i32> {
        let b = self.read_array::<4>()?;
        Ok(self.port.decode_int(b))
    }

    pub fn read_ints(&mut self, n: usize) -> Result<Vec<i32>> {
        (0..n).map(|_| self.read_int()).collect()
    }

    pub fn read_short(&mut self) -> Result<i16> {
        let b = self.read_array::<2>()?;
        Ok(self.port.decode_short(b))
    }

    pub fn read_off(&mut self, width: usize) -> Result<u64> {
        let mut buf = [0u8; PORT_OFF_T];
        let width = width.min(PORT_OFF_T);
        self.read_bytes(&mut buf[..width])?;
        self.port.decode_off(&buf[..width])
    }
}

/// Validates a count read from a file before it is used to size a buffer.
pub(crate) fn checked_count(n: i32, what: &str) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::CorruptTopology(format!("negative {what} count {n}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_host_layout() {
        let layout = detect_native_layout().unwrap();
        let expected = if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        assert_eq!(layout.order(), expected);
        assert_eq!(layout.int.order(), expected);
        assert_eq!(layout.shrt.order(), expected);
        assert_eq!(native_layout().unwrap(), layout);
    }

    #[test]
    fn canonical_patterns_match_test_values() {
        assert_eq!(DBL_TEST.to_be_bytes(), DBL_CMPR);
        assert_eq!(FLT_TEST.to_be_bytes(), FLT_CMPR);
        assert_eq!(OFF_TEST.to_be_bytes(), OFF_CMPR);
    }

    #[test]
    fn missing_pattern_byte_is_rejected() {
        let err = Permutation::<4>::locate("int", [0x01, 0x02, 0x03, 0x03], INT_CMPR).unwrap_err();
        assert!(matches!(err, Error::NonConformingLayout("int")));
    }

    #[test]
    fn classifies_mixed_order() {
        // PDP-11 style middle-endian long
        let p = Permutation::from_positions([1, 0, 3, 2]);
        assert_eq!(p.order(), ByteOrder::Other);
        let native = p.from_canonical(LNG_CMPR);
        assert_eq!(native, [0x02, 0x01, 0x04, 0x03]);
        assert_eq!(p.to_canonical(native), LNG_CMPR);
    }

    #[test]
    fn mixed_host_writes_correct_file_bytes() {
        let mut layout = NativeLayout::simulated(ByteOrder::Big);
        layout.lng = Permutation::from_positions([1, 0, 3, 2]);
        let big = PortInfo::with_layout(layout, ByteOrder::Big);
        let little = PortInfo::with_layout(layout, ByteOrder::Little);
        assert_eq!(big.encode_long(0x0102_0304), [1, 2, 3, 4]);
        assert_eq!(little.encode_long(0x0102_0304), [4, 3, 2, 1]);
        assert_eq!(little.decode_long([4, 3, 2, 1]), 0x0102_0304);
    }

    #[test]
    fn simulated_orders_reverse_double_bytes() {
        for host in [ByteOrder::Big, ByteOrder::Little] {
            let layout = NativeLayout::simulated(host);
            let be = PortInfo::with_layout(layout, ByteOrder::Big).encode_f64(1.3333);
            let mut le = PortInfo::with_layout(layout, ByteOrder::Little).encode_f64(1.3333);
            le.reverse();
            assert_eq!(be, le);
            assert_eq!(be, DBL_CMPR);
        }
    }

    #[test]
    fn native_bytes_match_host_encoding() {
        let port = PortInfo::native().unwrap();
        assert_eq!(port.native_f64(-2.5), (-2.5f64).to_ne_bytes());
    }

    #[test]
    fn offsets_respect_width() {
        let port = PortInfo::new(ByteOrder::Little).unwrap();
        let four = port.encode_off(70_000, 4).unwrap();
        assert_eq!(four.len(), 4);
        assert_eq!(port.decode_off(&four).unwrap(), 70_000);

        let big = 5_000_000_000u64;
        assert!(matches!(port.encode_off(big, 4), Err(Error::OffsetOverflow(_, 4))));
        let eight = port.encode_off(big, 8).unwrap();
        assert_eq!(port.decode_off(&eight).unwrap(), big);
    }

    #[test]
    fn reader_reports_truncation() {
        let port = PortInfo::new(ByteOrder::Big).unwrap();
        let mut r = PortReader::new(&[0u8, 1, 2][..], port);
        match r.read_f64() {
            Err(Error::Truncated { expected: 8, got: 3 }) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn writer_and_reader_agree() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let port = PortInfo::new(order).unwrap();
            let mut w = PortWriter::new(Vec::new(), port);
            w.write_f64(-123.456).unwrap();
            w.write_f32(0.25).unwrap();
            w.write_int(-42).unwrap();
            w.write_short(-7).unwrap();
            w.write_off(99, 8).unwrap();
            assert_eq!(w.position(), 8 + 4 + 4 + 2 + 8);
            let bytes = w.into_inner();

            let mut r = PortReader::new(bytes.as_slice(), port);
            assert_eq!(r.read_f64().unwrap(), -123.456);
            assert_eq!(r.read_f32().unwrap(), 0.25);
            assert_eq!(r.read_int().unwrap(), -42);
            assert_eq!(r.read_short().unwrap(), -7);
            assert_eq!(r.read_off(8).unwrap(), 99);
        }
    }
}
