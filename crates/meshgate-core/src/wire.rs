//! Radio wire format: what actually goes over the air.
//!
//! The mesh carries opaque frames of at most 255 bytes. The only frame the
//! gateway understands is the ADVERT discovery beacon, an ASCII line:
//!
//!   ADVERT <nodeIdHex> <name> <lat> <lon>
//!
//! Everything else is relayed untouched. Changing the beacon layout or the
//! FNV-1a constants breaks interoperability with deployed nodes.

// ── Constants ─────────────────────────────────────────────────────────────────

/// Maximum frame length the radio accepts.
pub const MAX_FRAME_LEN: usize = 255;

/// Literal that marks a frame as a discovery beacon.
pub const ADVERT_KEYWORD: &[u8; 6] = b"ADVERT";

/// Byte budget for a node name, matching the neighbour record.
pub const MAX_NAME_LEN: usize = 31;

/// Node id used as "to" for broadcast frames.
pub const BROADCAST_NODE_ID: u32 = 0xFFFF_FFFF;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

// ── Hashing ───────────────────────────────────────────────────────────────────

/// 32-bit FNV-1a over the raw frame bytes.
///
/// Used as the dedup key for repeat suppression. Must stay bit-exact.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// True iff every byte is printable ASCII (32..=126).
///
/// A single control or high byte marks the whole frame non-printable.
pub fn is_printable(data: &[u8]) -> bool {
    data.iter().all(|&b| (32..=126).contains(&b))
}

/// True iff the frame starts with the ADVERT literal.
pub fn is_advert(data: &[u8]) -> bool {
    data.len() >= ADVERT_KEYWORD.len() && &data[..ADVERT_KEYWORD.len()] == ADVERT_KEYWORD
}

// ── Advert ────────────────────────────────────────────────────────────────────

/// Decoded discovery beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvertMessage {
    pub node_id: u32,
    pub node_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl AdvertMessage {
    pub fn new(node_id: u32, node_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            node_id,
            node_name: node_name.into(),
            latitude,
            longitude,
        }
    }

    /// Parse a beacon frame.
    ///
    /// Only the leading literal is checked. Numeric fields take the longest
    /// valid leading part of their token (`2Ag` reads as 0x2A, `-33.87S` as
    /// -33.87). Missing or wholly unparsable tokens fall back to defaults
    /// (id 0, empty name, 0.0 coordinates); a beacon never fails because of
    /// its fields.
    pub fn parse(frame: &[u8]) -> Result<Self, AdvertError> {
        if !is_advert(frame) {
            return Err(AdvertError::NotAdvert);
        }
        let line = std::str::from_utf8(frame).map_err(|_| AdvertError::NotText)?;

        // Consecutive spaces collapse, the first token is the keyword itself.
        let mut tokens = line.split(' ').filter(|t| !t.is_empty()).skip(1);

        let node_id = tokens.next().map(leading_hex_u32).unwrap_or(0);
        let node_name = tokens.next().map(truncate_name).unwrap_or_default();
        let latitude = tokens.next().map(leading_f64).unwrap_or(0.0);
        let longitude = tokens.next().map(leading_f64).unwrap_or(0.0);

        Ok(Self {
            node_id,
            node_name,
            latitude,
            longitude,
        })
    }

    /// Encode as the on-air line.
    ///
    /// The name is written raw: a name containing spaces produces a line
    /// that parses back with a truncated name and shifted coordinates.
    pub fn encode(&self) -> String {
        format!(
            "ADVERT {:08X} {} {:.6} {:.6}",
            self.node_id, self.node_name, self.latitude, self.longitude
        )
    }
}

/// Cut a name to the record budget without splitting a character.
pub fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a frame is not a beacon. Callers treat both as "relay untouched".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdvertError {
    #[error("frame does not start with ADVERT")]
    NotAdvert,

    #[error("frame is not valid text")]
    NotText,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

// ── Leading-number scanning ───────────────────────────────────────────────────

/// Hex value of the longest leading run of digits.
///
/// Accepts an optional sign and `0x` prefix. A negative value wraps the way
/// an unsigned conversion does; overflow saturates at `u32::MAX`. No digits
/// yields 0.
fn leading_hex_u32(token: &str) -> u32 {
    let mut rest = token.trim_start();
    let negative = rest.starts_with('-');
    rest = rest.strip_prefix(&['+', '-'][..]).unwrap_or(rest);
    if let Some(after) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        if after.starts_with(|c: char| c.is_ascii_hexdigit()) {
            rest = after;
        }
    }

    let mut value: u32 = 0;
    for digit in rest.chars().map_while(|c| c.to_digit(16)) {
        match value.checked_mul(16).and_then(|v| v.checked_add(digit)) {
            Some(v) => value = v,
            None => return u32::MAX,
        }
    }
    if negative {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Decimal value of the longest leading float literal, or 0.0.
///
/// Recognises `[sign] digits [. digits] [e [sign] digits]`; an exponent
/// marker with no digits after it is left off.
fn leading_f64(token: &str) -> f64 {
    let s = token.trim_start().as_bytes();
    let digits_from = |mut i: usize| {
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(s.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if s.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }
    if matches!(s.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(s.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    std::str::from_utf8(&s[..end])
        .ok()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0.0)
}
