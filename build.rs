use std::env;
use std::path::Path;

/// Point Windows builds at a vcpkg FFmpeg when `FFMPEG_DIR` is missing.
///
/// `ffmpeg-sys-next` does the actual discovery; this only turns a cryptic
/// link failure into an actionable warning.
fn main() {
    for variable in ["FFMPEG_DIR", "VCPKG_ROOT", "VCPKGRS_TRIPLET"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Some(vcpkg_root) = env::var_os("VCPKG_ROOT") else {
        println!(
            "cargo:warning=vidthumb needs FFmpeg development libraries. Set FFMPEG_DIR, or install ffmpeg with vcpkg and set VCPKG_ROOT."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let candidate = Path::new(&vcpkg_root).join("installed").join(&triplet);
    if candidate.join("include").join("libavcodec").exists() {
        println!(
            "cargo:warning=Found FFmpeg under {}; export FFMPEG_DIR={} if linking fails.",
            candidate.display(),
            candidate.display(),
        );
    } else {
        println!(
            "cargo:warning=No FFmpeg headers under {}. Run `vcpkg install ffmpeg:{triplet}`.",
            candidate.display(),
        );
    }
}
