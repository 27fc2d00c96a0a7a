use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn opaque_source_replaces_destination() {
    let mut dst = vec![255u8, 255, 255, 255];
    assert!(premul_over_in_place(&mut dst, &[0, 0, 0, 255]));
    assert_eq!(dst, vec![0, 0, 0, 255]);
}

#[test]
fn transparent_source_keeps_destination() {
    let mut dst = vec![10u8, 20, 30, 255];
    assert!(premul_over_in_place(&mut dst, &[0, 0, 0, 0]));
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn mismatched_lengths_are_rejected() {
    let mut dst = vec![0u8; 8];
    assert!(!premul_over_in_place(&mut dst, &[0u8; 4]));
}
