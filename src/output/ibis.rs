//! IBIS telegram encoding.
//!
//! Telegrams are 7-bit ASCII terminated by a carriage return, followed by a
//! checksum byte: 0x7F XORed with every preceding byte.

/// Two decimal digits of block count.
const MAX_BLOCKS: usize = 99;
const BLOCK_SIZE: usize = 4;

/// DS003c "next stop" telegram: `v`, block count, text padded with spaces to
/// a multiple of four characters.
pub fn next_stop_telegram(text: &str) -> Vec<u8> {
    let mut payload: Vec<u8> = text.chars().filter_map(encode_char).collect();
    payload.truncate(MAX_BLOCKS * BLOCK_SIZE);

    let blocks = payload.len().div_ceil(BLOCK_SIZE);
    payload.resize(blocks * BLOCK_SIZE, b' ');

    let mut telegram = format!("v{blocks:02}").into_bytes();
    telegram.extend_from_slice(&payload);
    telegram.push(b'\r');
    telegram.push(checksum(&telegram));
    telegram
}

/// Umlauts take the place of the national-variant ASCII brackets.
fn encode_char(c: char) -> Option<u8> {
    match c {
        'Ä' => Some(b'['),
        'Ö' => Some(b'\\'),
        'Ü' => Some(b']'),
        'ä' => Some(b'{'),
        'ö' => Some(b'|'),
        'ü' => Some(b'}'),
        'ß' => Some(b'~'),
        c if c.is_ascii() && !c.is_ascii_control() => Some(c as u8),
        _ => None,
    }
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0x7F, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::checksum;
    use super::next_stop_telegram;

    #[test]
    fn test_pads_to_blocks() {
        let telegram = next_stop_telegram("Hallo");
        assert_eq!(&telegram[..telegram.len() - 1], b"v02Hallo   \r");
    }

    #[test]
    fn test_empty_text_blanks() {
        let telegram = next_stop_telegram("");
        assert_eq!(&telegram[..telegram.len() - 1], b"v00\r");
    }

    #[test]
    fn test_checksum_is_last_byte() {
        let telegram = next_stop_telegram("Frankfurt");
        let (body, sum) = telegram.split_at(telegram.len() - 1);
        assert_eq!(sum[0], checksum(body));

        // Folding over the whole telegram cancels out.
        assert_eq!(checksum(&telegram), 0);
    }

    #[test]
    fn test_umlauts_are_mapped() {
        let telegram = next_stop_telegram("Köln Süd");
        assert_eq!(&telegram[3..11], b"K|ln S}d");
    }

    #[test]
    fn test_control_characters_are_dropped() {
        let telegram = next_stop_telegram("A\rB\n");
        assert_eq!(&telegram[..telegram.len() - 1], b"v01AB  \r");
    }
}
