use bitmix_core::{BitmixError, Finalizer, Result};

pub fn run(name: &str) -> Result<()> {
    print!("{}", describe(name)?);
    Ok(())
}

/// Source for a parameterized finalizer, or a one-line description of a builtin.
fn describe(name: &str) -> Result<String> {
    match bitmix_core::lookup(name) {
        Some(Finalizer::XorshiftMul3(def)) => Ok(def.render_source(0)),
        Some(Finalizer::Builtin(b)) => Ok(format!("// {}: {}\n", b.name, b.description)),
        None => Err(BitmixError::UnknownFinalizer {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterized_renders_source() {
        let src = describe("murmur3").unwrap();
        assert!(src.starts_with("pub fn murmur3(x: u64) -> u64 {"));
        assert!(src.contains("0xff51afd7ed558ccd"));
    }

    #[test]
    fn builtin_renders_description() {
        assert!(describe("wyhash").unwrap().starts_with("// wyhash: "));
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!(matches!(
            describe("mix99"),
            Err(BitmixError::UnknownFinalizer { .. })
        ));
    }
}
