#![no_main]

use arbitrary::{Arbitrary, Result as ArbResult, Unstructured};
use libfuzzer_sys::fuzz_target;
use memview::Buffer;

#[derive(Debug)]
enum Operation {
    Slice { start: u16, end: u16 },
    Fill { start: u16, end: u16, value: u8 },
    Clear,
    Clone,
}

impl<'a> Arbitrary<'a> for Operation {
    fn arbitrary(u: &mut Unstructured<'a>) -> ArbResult<Self> {
        let tag = u.int_in_range::<u8>(0..=3)?;
        let op = match tag {
            0 => Operation::Slice {
                start: u.arbitrary()?,
                end: u.arbitrary()?,
            },
            1 => Operation::Fill {
                start: u.arbitrary()?,
                end: u.arbitrary()?,
                value: u.arbitrary()?,
            },
            2 => Operation::Clear,
            _ => Operation::Clone,
        };
        Ok(op)
    }
}

#[derive(Debug)]
struct FuzzCase {
    data: Vec<u8>,
    ops: Vec<Operation>,
}

impl<'a> Arbitrary<'a> for FuzzCase {
    fn arbitrary(u: &mut Unstructured<'a>) -> ArbResult<Self> {
        let len = u.int_in_range::<usize>(1..=64)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(u.arbitrary()?);
        }

        let ops_len = u.int_in_range::<usize>(0..=64)?;
        let mut ops = Vec::with_capacity(ops_len);
        for _ in 0..ops_len {
            ops.push(u.arbitrary()?);
        }

        Ok(Self { data, ops })
    }
}

fn clamp_range(start: u16, end: u16, len: usize) -> (usize, usize) {
    let start = start as usize % (len + 1);
    let end = end as usize % (len + 1);
    if start <= end {
        (start, end)
    } else {
        (end, start)
    }
}

fuzz_target!(|case: FuzzCase| {
    let mut model = case.data.clone();
    let mut buffer = Buffer::with_size(case.data.len());
    buffer.as_mut_slice().copy_from_slice(&case.data);

    for op in case.ops {
        match op {
            Operation::Slice { start, end } => {
                let (start, end) = clamp_range(start, end, model.len());
                let view = buffer.view(start..end);
                assert_eq!(view.len(), end - start);
                assert_eq!(view.as_bytes(), &model[start..end]);
            }
            Operation::Fill { start, end, value } => {
                let (start, end) = clamp_range(start, end, model.len());
                let span = buffer.span(start..end);
                unsafe { span.as_bytes_mut() }.fill(value);
                model[start..end].fill(value);
            }
            Operation::Clear => {
                buffer.clear();
                model.fill(0);
            }
            Operation::Clone => {
                let copy = buffer.clone();
                assert_eq!(copy.as_slice(), buffer.as_slice());
                assert_ne!(copy.as_ptr(), buffer.as_ptr());
            }
        }
        assert_eq!(buffer.as_slice(), &model[..]);
    }
});
