use std::any::Any;

/// `count` evenly spaced values over `[start, end]`, both ends included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            values[count - 1] = end;
            values
        }
    }
}

pub(crate) fn panic_payload_to_string(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    "Worker panicked with a non-string payload.".to_string()
}

#[cfg(test)]
mod tests {
    use super::{linspace, panic_payload_to_string};
    use approx::assert_relative_eq;

    #[test]
    fn linspace_includes_both_ends() {
        let values = linspace(1.8, 5.5, 400);
        assert_eq!(values.len(), 400);
        assert_eq!(values[0], 1.8);
        assert_eq!(values[399], 5.5);
        let step = (5.5 - 1.8) / 399.0;
        for pair in values.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], step, max_relative = 1e-9);
        }
    }

    #[test]
    fn linspace_degenerate_counts() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.5, 9.0, 1), vec![2.5]);
        assert_eq!(linspace(1.0, 2.0, 2), vec![1.0, 2.0]);
    }

    #[test]
    fn panic_payloads_become_messages() {
        let owned = std::panic::catch_unwind(|| panic!("owned {}", 7)).unwrap_err();
        assert_eq!(panic_payload_to_string(owned), "owned 7");
        let literal = std::panic::catch_unwind(|| panic!("literal")).unwrap_err();
        assert_eq!(panic_payload_to_string(literal), "literal");
        let other = std::panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert!(panic_payload_to_string(other).contains("non-string"));
    }
}
