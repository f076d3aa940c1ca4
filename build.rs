/// Expose the compilation target triple to the crate at build time.
///
/// `ServiceIdentity::info` reports it next to the service version so the
/// `--version` and `--dump` banners say which build produced them.
fn main() {
    println!(
        "cargo:rustc-env=TARGET={}",
        std::env::var("TARGET").unwrap()
    );
}
