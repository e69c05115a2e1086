use bitmix_core::finalizer::{BUILTINS, XORSHIFT_MUL_3, XorshiftMul3};

pub fn run(params: bool) {
    print!("{}", listing(params));
}

fn listing(params: bool) -> String {
    if !params {
        let builtins: Vec<&str> = BUILTINS.iter().map(|b| b.name).collect();
        return format!(
            "{}\nbuiltins: {}\n",
            bitmix_core::brace_list(),
            builtins.join(", ")
        );
    }

    let width = bitmix_core::names().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    for def in &XORSHIFT_MUL_3 {
        out.push_str(&format!("{:<width$}  {}\n", def.name, param_line(def)));
    }
    for b in &BUILTINS {
        out.push_str(&format!("{:<width$}  {}\n", b.name, b.description));
    }
    out
}

/// Shifts and multipliers in stage order, flagged when an even multiplier
/// makes the mix lossy.
pub(super) fn param_line(def: &XorshiftMul3) -> String {
    let line = format!(
        "{:2} 0x{:016x} {:2} 0x{:016x} {:2}",
        def.s0, def.m0, def.s1, def.m1, def.s2
    );
    if def.is_bijective() {
        line
    } else {
        format!("{line} (not bijective)")
    }
}
