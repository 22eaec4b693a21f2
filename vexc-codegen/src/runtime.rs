//! Runtime primitives called from generated routines.
//!
//! The CPU backend registers these symbols with the JIT, the GPU backend
//! emits device versions of the same functions, and the interpreter calls
//! them directly. All three observe identical results.

use vexc_types::NULL_ARRAY_LENGTH;

use crate::ir::RuntimeFn;

/// Row status: the row satisfied every qual.
pub const ROW_PASSED: i32 = 1;
/// Row status: some qual rejected the row.
pub const ROW_FILTERED: i32 = 0;
/// Row status: integer or float division by zero.
pub const ERR_DIV_BY_ZERO: i32 = -1;
/// Row status: a datetime precision cast left the 64-bit range.
pub const ERR_OVERFLOW_OR_UNDERFLOW: i32 = -2;

/// Three-valued `NOT` over `0`, `1` and `null`.
pub extern "C" fn logical_not(operand: i8, null: i8) -> i8 {
    if operand == null {
        operand
    } else {
        (operand == 0) as i8
    }
}

/// Three-valued `AND`: false wins over null.
pub extern "C" fn logical_and(lhs: i8, rhs: i8, null: i8) -> i8 {
    if lhs == null {
        return if rhs == 0 { rhs } else { null };
    }
    if rhs == null {
        return if lhs == 0 { lhs } else { null };
    }
    (lhs != 0 && rhs != 0) as i8
}

/// Three-valued `OR`: true wins over null.
pub extern "C" fn logical_or(lhs: i8, rhs: i8, null: i8) -> i8 {
    if lhs == null {
        return if rhs == 0 { null } else { rhs };
    }
    if rhs == null {
        return if lhs == 0 { null } else { lhs };
    }
    (lhs != 0 || rhs != 0) as i8
}

/// Whether the array header at `pos` marks a null array.
///
/// # Safety
///
/// `headers` must point to at least `pos + 1` readable `i32` length headers.
pub unsafe extern "C" fn array_is_null(headers: *const i32, pos: i64) -> i8 {
    // SAFETY: the caller guarantees the header array covers `pos`.
    let header = unsafe { *headers.add(pos as usize) };
    (header == NULL_ARRAY_LENGTH) as i8
}

/// Safe counterpart of [`array_is_null`] over a header slice.
pub fn array_is_null_at(headers: &[i32], pos: usize) -> bool {
    headers[pos] == NULL_ARRAY_LENGTH
}

/// Address of the host implementation of `func`, for JIT symbol lookup.
pub fn host_address(func: RuntimeFn) -> *const u8 {
    match func {
        RuntimeFn::LogicalAnd => logical_and as *const u8,
        RuntimeFn::LogicalOr => logical_or as *const u8,
        RuntimeFn::LogicalNot => logical_not as *const u8,
        RuntimeFn::ArrayIsNull => array_is_null as *const u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: i8 = i8::MIN;

    #[test]
    fn and_truth_table() {
        let cases = [
            (1, 1, 1),
            (1, 0, 0),
            (0, 1, 0),
            (0, 0, 0),
            (N, 0, 0),
            (0, N, 0),
            (N, 1, N),
            (1, N, N),
            (N, N, N),
        ];
        for (lhs, rhs, expected) in cases {
            assert_eq!(logical_and(lhs, rhs, N), expected, "{lhs} AND {rhs}");
        }
    }

    #[test]
    fn or_truth_table() {
        let cases = [
            (1, 1, 1),
            (1, 0, 1),
            (0, 1, 1),
            (0, 0, 0),
            (N, 1, 1),
            (1, N, 1),
            (N, 0, N),
            (0, N, N),
            (N, N, N),
        ];
        for (lhs, rhs, expected) in cases {
            assert_eq!(logical_or(lhs, rhs, N), expected, "{lhs} OR {rhs}");
        }
    }

    #[test]
    fn not_keeps_null() {
        assert_eq!(logical_not(1, N), 0);
        assert_eq!(logical_not(0, N), 1);
        assert_eq!(logical_not(N, N), N);
    }

    #[test]
    fn array_null_header() {
        let headers = [3, NULL_ARRAY_LENGTH, 0];
        assert!(!array_is_null_at(&headers, 0));
        assert!(array_is_null_at(&headers, 1));
        // SAFETY: index 2 is within the three-element array.
        assert_eq!(unsafe { array_is_null(headers.as_ptr(), 2) }, 0);
    }
}
