use super::*;

#[test]
fn basic() {
    let a = Vaddr::new(0x1000);
    assert_eq!(a.as_u64(), 0x1000);
    assert!(!a.is_null());
    assert!(Vaddr::null().is_null());
}

#[test]
fn arithmetic() {
    let a = Vaddr::new(0x1000);
    assert_eq!(a.add(0x100).as_u64(), 0x1100);
    assert_eq!(a.sub(0x100).as_u64(), 0x0F00);
    assert_eq!((a + 0x100).as_u64(), 0x1100);
    assert_eq!((a - 0x100).as_u64(), 0x0F00);
}

#[test]
fn diff_saturates() {
    let a = Vaddr::new(0x1000);
    let b = Vaddr::new(0x2000);
    assert_eq!(b.diff(a), 0x1000);
    assert_eq!(a.diff(b), 0);
}

#[test]
fn alignment() {
    assert!(Vaddr::new(0x08).is_aligned(8));
    assert!(!Vaddr::new(0x09).is_aligned(8));
}

#[test]
fn debug_format() {
    assert_eq!(format!("{:?}", Vaddr::new(0x1234)), "Vaddr(0x1234)");
}
