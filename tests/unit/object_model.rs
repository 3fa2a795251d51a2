//! Object model: size rule, set-once type, atomic header bits.

use std::sync::Arc;
use std::thread;

use rtdbg::layout::{BIT_SBLK_FINALIZER_RUN, BIT_SBLK_SPIN_LOCK};
use rtdbg::{
    object_size, HeapObject, LayoutError, ObjHeader, ObjectShape, PointerWidth, TypeDescriptor,
};

#[test]
fn test_size_of_fixed_object_is_base_size() {
    let ty = TypeDescriptor::fixed(24);
    let mut obj = HeapObject::new(0x1000);
    obj.init_type(&ty).unwrap();
    obj.init_array_length(99);
    assert_eq!(obj.size().unwrap(), 24);
}

#[test]
fn test_size_of_array_object() {
    let ty = TypeDescriptor::array(24, 8);
    let mut obj = HeapObject::new(0x1000);
    obj.init_type(&ty).unwrap();

    obj.init_array_length(0);
    assert_eq!(obj.size().unwrap(), 24);

    obj.init_array_length(10);
    assert_eq!(obj.array_length(), 10);
    assert_eq!(obj.size().unwrap(), 24 + 80);
}

#[test]
fn test_size_needs_type() {
    let obj = HeapObject::new(0x1000);
    assert_eq!(
        obj.size(),
        Err(LayoutError::TypeNotSet { address: 0x1000 })
    );
}

#[test]
fn test_init_type_once() {
    let first = TypeDescriptor::fixed(24);
    let second = TypeDescriptor::fixed(32);
    let mut obj = HeapObject::new(0x2000);
    assert!(obj.init_type(&first).is_ok());
    assert_eq!(
        obj.init_type(&second),
        Err(LayoutError::TypeAlreadySet { address: 0x2000 })
    );
    // The original type survives
    assert_eq!(obj.ty(), Some(&first));
}

#[test]
fn test_array_data_skips_prefix() {
    for width in [PointerWidth::Four, PointerWidth::Eight] {
        let shape = ObjectShape::new(width);
        let ty = TypeDescriptor::array(shape.array_base_size(), 2);
        let mut obj = HeapObject::with_shape(0x8000, shape);
        obj.init_type(&ty).unwrap();
        assert_eq!(
            obj.array_data().unwrap(),
            0x8000 + u64::from(shape.array_size())
        );
    }
}

#[test]
fn test_component_size_rule() {
    assert!(TypeDescriptor::string(20).validate().is_ok());
    assert!(TypeDescriptor::array(24, 16).validate().is_ok());
    let bad = TypeDescriptor {
        component_size: 4,
        ..TypeDescriptor::fixed(24)
    };
    assert!(matches!(
        bad.validate(),
        Err(LayoutError::ComponentSizeOutOfRange { component_size: 4 })
    ));
}

#[test]
fn test_object_size_extremes() {
    assert_eq!(
        object_size(u32::MAX, u16::MAX, u32::MAX),
        u64::from(u32::MAX) + u64::from(u32::MAX) * u64::from(u16::MAX)
    );
    assert_eq!(object_size(16, 0, u32::MAX), 16);
}

#[test]
fn test_set_and_clear_bits() {
    let header = ObjHeader::new();
    assert_eq!(header.set_bit(BIT_SBLK_SPIN_LOCK), 0);
    header.set_bit(BIT_SBLK_FINALIZER_RUN);
    assert!(header.is_set(BIT_SBLK_SPIN_LOCK | BIT_SBLK_FINALIZER_RUN));
    header.clear_bit(BIT_SBLK_SPIN_LOCK);
    assert_eq!(header.load(), BIT_SBLK_FINALIZER_RUN);
}

#[test]
fn test_concurrent_set_bit_is_union() {
    for _ in 0..200 {
        let header = Arc::new(ObjHeader::new());
        let handles: Vec<_> = (0..16)
            .map(|bit| {
                let header = Arc::clone(&header);
                thread::spawn(move || {
                    header.set_bit(1 << bit);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(header.load(), 0xFFFF);
    }
}

#[test]
fn test_concurrent_set_and_clear_distinct_bits() {
    let header = Arc::new(ObjHeader::with_bits(0xFFFF_0000));
    let handles: Vec<_> = (0..16)
        .map(|bit| {
            let header = Arc::clone(&header);
            thread::spawn(move || {
                for _ in 0..1000 {
                    header.set_bit(1 << bit);
                    header.clear_bit(1 << (bit + 16));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(header.load(), 0x0000_FFFF);
}
