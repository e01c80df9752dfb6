use clap::Parser;
use renderer::{Color, FadeCurve};

#[derive(Parser, Debug)]
#[command(
    name = "splitshade",
    author,
    version,
    about = "Interactive viewer for the intrinsic-image render pipeline",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Drive the albedo/shading/compositor pipeline instead of the
    /// single-scene path.
    #[arg(long)]
    pub intrinsic: bool,

    /// Window size (e.g. `1280x720`).
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_size,
        default_value = "1280x720"
    )]
    pub size: (u32, u32),

    /// Disable the fade-in pass on every rasterizer stage.
    #[arg(long)]
    pub no_fade: bool,

    /// Fade-in easing: `linear`, `smoothstep`, or `ease-in-out`.
    #[arg(
        long,
        value_name = "CURVE",
        value_parser = parse_curve,
        default_value = "linear"
    )]
    pub fade_curve: FadeCurve,

    /// Background color as `#rrggbb`.
    #[arg(
        long,
        value_name = "COLOR",
        value_parser = parse_color,
        default_value = "#101018"
    )]
    pub background: Color,
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{value}`"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in `{value}`"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in `{value}`"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got `{value}`"));
    }
    Ok((width, height))
}

fn parse_curve(value: &str) -> Result<FadeCurve, String> {
    match value.to_ascii_lowercase().as_str() {
        "linear" => Ok(FadeCurve::Linear),
        "smoothstep" => Ok(FadeCurve::Smoothstep),
        "ease-in-out" | "ease" => Ok(FadeCurve::EaseInOut),
        other => Err(format!(
            "unknown curve `{other}`; expected linear, smoothstep, or ease-in-out"
        )),
    }
}

fn parse_color(value: &str) -> Result<Color, String> {
    Color::from_hex(value).ok_or_else(|| format!("expected #rrggbb, got `{value}`"))
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_accepts_separator_variants() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn parse_curve_rejects_unknown_names() {
        assert_eq!(parse_curve("smoothstep"), Ok(FadeCurve::Smoothstep));
        assert_eq!(parse_curve("EASE"), Ok(FadeCurve::EaseInOut));
        assert!(parse_curve("bounce").is_err());
    }

    #[test]
    fn parse_color_requires_six_hex_digits() {
        assert_eq!(parse_color("#102030"), Ok(Color::rgb(0x10, 0x20, 0x30)));
        assert!(parse_color("#12345").is_err());
    }
}
