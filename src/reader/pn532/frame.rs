/// Information frame codec for the PN532 host link

use crate::error::Error;

/// Frame direction marker: host to chip.
pub const TFI_HOST: u8 = 0xD4;
/// Frame direction marker: chip to host.
pub const TFI_CHIP: u8 = 0xD5;

/// Acknowledge frame. The chip sends it after every well-formed command;
/// the host writes it to abort a pending command.
pub const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// Frame bytes around the payload: preamble and start code (3), length and
/// length checksum (2), direction marker (1), data checksum and
/// postamble (2).
pub const OVERHEAD: usize = 8;

/// Build a host command frame around `payload` into `out`.
///
/// Returns the number of bytes written. `out` must hold at least
/// `payload.len() + OVERHEAD` bytes and `payload` starts with the command
/// code, so it is never empty.
pub fn build_command(payload: &[u8], out: &mut [u8]) -> usize {
    let len = (payload.len() + 1) as u8; // direction marker counts toward LEN
    out[0] = 0x00;
    out[1] = 0x00;
    out[2] = 0xFF;
    out[3] = len;
    out[4] = len.wrapping_neg();
    out[5] = TFI_HOST;
    out[6..6 + payload.len()].copy_from_slice(payload);
    let sum = payload.iter().fold(TFI_HOST, |acc, b| acc.wrapping_add(*b));
    out[6 + payload.len()] = sum.wrapping_neg();
    out[7 + payload.len()] = 0x00;
    payload.len() + OVERHEAD
}

/// Extract the payload of a chip response frame.
///
/// `raw` is the window clocked in after a data-read control byte. The chip
/// may lead with idle zeros, so the start code is searched for, not assumed
/// at offset zero. The returned slice begins at the response command code.
pub fn parse_response(raw: &[u8]) -> Result<&[u8], Error> {
    let start = raw
        .windows(2)
        .position(|w| w == [0x00, 0xFF])
        .ok_or(Error::BadFrame("no start code"))?;
    let body = &raw[start + 2..];
    if body.len() < 3 {
        return Err(Error::BadFrame("truncated header"));
    }
    let len = body[0] as usize;
    if body[0].wrapping_add(body[1]) != 0 {
        return Err(Error::BadFrame("length checksum"));
    }
    if len == 0 {
        return Err(Error::BadFrame("empty frame"));
    }
    if body.len() < len + 3 {
        return Err(Error::BadFrame("truncated body"));
    }
    if body[2] != TFI_CHIP {
        return Err(Error::BadFrame("wrong direction marker"));
    }
    let dcs = body[2 + len];
    let sum = body[2..2 + len]
        .iter()
        .fold(dcs, |acc, b| acc.wrapping_add(*b));
    if sum != 0 {
        return Err(Error::BadFrame("data checksum"));
    }
    Ok(&body[3..2 + len])
}

/// Whether `raw` starts with the acknowledge frame.
pub fn is_ack(raw: &[u8]) -> bool {
    raw.len() >= ACK.len() && raw[..ACK.len()] == ACK
}

/// Build a chip response frame, for driver test scripts.
#[cfg(test)]
pub fn build_response(payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 1) as u8;
    let mut out = vec![0x00, 0x00, 0xFF, len, len.wrapping_neg(), TFI_CHIP];
    out.extend_from_slice(payload);
    let sum = payload.iter().fold(TFI_CHIP, |acc, b| acc.wrapping_add(*b));
    out.push(sum.wrapping_neg());
    out.push(0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_build_firmware_query_frame() {
        let mut out = [0u8; 16];
        let n = build_command(&[0x02], &mut out);
        assert_eq!(out[..n], hex!("0000ff02fed4022a00"));
    }

    #[test]
    fn test_build_sam_configuration_frame() {
        let mut out = [0u8; 16];
        let n = build_command(&hex!("14011401"), &mut out);
        assert_eq!(out[..n], hex!("0000ff05fbd4140114010200"));
    }

    #[test]
    fn test_parse_firmware_response() {
        let raw = hex!("0000ff06fad50332010607e800");
        assert_eq!(parse_response(&raw).unwrap(), hex!("0332010607"));
    }

    #[test]
    fn test_parse_tolerates_leading_idle_bytes() {
        let raw = hex!("000000ff06fad50332010607e800");
        assert_eq!(parse_response(&raw).unwrap(), hex!("0332010607"));
    }

    #[test]
    fn test_parse_rejects_corruption() {
        let missing = [0xAAu8; 8];
        assert!(matches!(
            parse_response(&missing),
            Err(Error::BadFrame("no start code"))
        ));

        let mut bad_lcs = hex!("0000ff06fad50332010607e800");
        bad_lcs[4] = 0xFB;
        assert!(matches!(
            parse_response(&bad_lcs),
            Err(Error::BadFrame("length checksum"))
        ));

        let mut bad_dcs = hex!("0000ff06fad50332010607e800");
        bad_dcs[11] = 0xE9;
        assert!(matches!(
            parse_response(&bad_dcs),
            Err(Error::BadFrame("data checksum"))
        ));

        let mut host_marker = hex!("0000ff06fad50332010607e800");
        host_marker[5] = TFI_HOST;
        assert!(matches!(
            parse_response(&host_marker),
            Err(Error::BadFrame("wrong direction marker"))
        ));

        let short = hex!("0000ff06fad503");
        assert!(matches!(
            parse_response(&short),
            Err(Error::BadFrame("truncated body"))
        ));
    }

    #[test]
    fn test_response_builder_matches_parser() {
        let frame = build_response(&hex!("4b01010004086f52"));
        let payload = parse_response(&frame).unwrap();
        assert_eq!(payload, hex!("4b01010004086f52"));
    }

    #[test]
    fn test_ack_recognition() {
        assert!(is_ack(&ACK));
        assert!(is_ack(&hex!("0000ff00ff00ffff")));
        assert!(!is_ack(&hex!("0000ff01ff00")));
        assert!(!is_ack(&hex!("0000ff")));
    }
}
