use naga::front::wgsl::parse_str;

const SHADERS: &[(&str, &str)] = &[("magnify", include_str!("../src/shaders/magnify.wgsl"))];

#[test]
fn all_backend_shaders_parse() {
    for (name, source) in SHADERS {
        let module = parse_str(source).unwrap_or_else(|err| panic!("{name} failed: {err}"));
        for required in [
            "real_to_complex",
            "center_complex",
            "conjugate_complex",
            "scale_complex",
            "bitrev_rows",
            "bitrev_cols",
            "butterfly_rows",
            "butterfly_cols",
            "phase_difference",
            "apply_filter",
            "zero_complex",
            "accumulate",
            "complex_to_real",
            "complex_to_magnitude",
            "complex_to_phase",
        ] {
            assert!(
                module
                    .entry_points
                    .iter()
                    .any(|entry| entry.name == required),
                "{name} is missing the {required} entry point"
            );
        }
    }
}
