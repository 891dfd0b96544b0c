//! Frame decoding for the supported scale framings. Pure functions, no I/O.

use super::models::ScaleModel;
use super::{Result, ScaleError};

/// Control byte sent to passive units to request a reading.
pub const ENQ: u8 = 0x05;

/// Width of the weight field in both framings.
const FIELD_LEN: usize = 5;

/// Decode one raw frame into kilograms.
///
/// Both framings carry a 5-digit integer weight field with three implied
/// decimals, so the field divides by exactly 1000 to give kilograms.
/// Abnormal platter conditions come back as marker characters in place of
/// digits and map onto the corresponding [`ScaleError`] variants.
pub fn decode(model: ScaleModel, frame: &[u8]) -> Result<f64> {
    match model {
        ScaleModel::Toledo => decode_toledo(frame),
        ScaleModel::Filizola => decode_filizola(frame),
    }
}

/// Toledo framing: the weight field is the 5 bytes ending one position
/// before the end of the frame; the final byte is a terminator. A field of
/// repeated markers signals an abnormal condition.
fn decode_toledo(frame: &[u8]) -> Result<f64> {
    if frame.len() < FIELD_LEN + 1 {
        return Err(malformed(frame));
    }

    let field = &frame[frame.len() - FIELD_LEN - 1..frame.len() - 1];
    match field {
        b"IIIII" => Err(ScaleError::Unstable),
        b"NNNNN" => Err(ScaleError::Negative),
        b"SSSSS" => Err(ScaleError::Overload),
        _ => parse_field(field),
    }
}

/// Filizola framing: the weight field is the last 5 bytes of the frame; a
/// marker in the first field position signals an abnormal condition.
fn decode_filizola(frame: &[u8]) -> Result<f64> {
    if frame.len() < FIELD_LEN {
        return Err(malformed(frame));
    }

    let field = &frame[frame.len() - FIELD_LEN..];
    match field[0] {
        b'I' => Err(ScaleError::Unstable),
        b'N' => Err(ScaleError::Negative),
        b'S' => Err(ScaleError::Overload),
        _ => parse_field(field),
    }
}

fn parse_field(field: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(field).map_err(|_| parse_error(field))?;
    let scaled: i64 = text.trim().parse().map_err(|_| parse_error(field))?;
    Ok(scaled as f64 / 1000.0)
}

fn malformed(frame: &[u8]) -> ScaleError {
    ScaleError::MalformedFrame {
        raw: String::from_utf8_lossy(frame).into_owned(),
    }
}

fn parse_error(field: &[u8]) -> ScaleError {
    ScaleError::ParseError {
        raw: String::from_utf8_lossy(field).into_owned(),
    }
}
