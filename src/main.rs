fn main() {
    std::process::exit(plot_stems::cli::run());
}
