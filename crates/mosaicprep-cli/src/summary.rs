use console::Style;
use mosaicprep_core::config::PipelineConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_config_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Mosaicprep Pipeline"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!(
        "  {:<16}{}",
        s.label.apply_to("Frame log"),
        s.path.apply_to(config.layout.frame_log.display())
    );
    println!(
        "  {:<16}{}",
        s.label.apply_to("Catalog"),
        s.path.apply_to(config.layout.catalog.display())
    );
    println!(
        "  {:<16}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(config.layout.output_dir.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Astrometry"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Match radius"),
        s.value.apply_to(format!("{:.1}\"", config.astrometry.match_radius_arcsec))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Field radius"),
        s.value
            .apply_to(format!("{:.4} deg", config.astrometry.search_radius_deg))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Epoch"),
        s.value
            .apply_to(format!("MJD {:.3}", config.astrometry.reference_epoch_mjd))
    );
    println!(
        "    {:<14}{:?}",
        s.label.apply_to("Fallback"),
        config.astrometry.fallback
    );
    println!();

    println!("  {}", s.header.apply_to("Background"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Clip sigma"),
        s.value.apply_to(format!(
            "+{:.1} / -{:.1}",
            config.background.clip_sigma_pos, config.background.clip_sigma_neg
        ))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Dilation"),
        s.value.apply_to(config.background.n_dilation)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Template"),
        s.value.apply_to(config.background.kind.label())
    );
    println!();

    println!("  {}", s.header.apply_to("Subtraction"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Clip sigma"),
        s.value
            .apply_to(format!("+/-{:.1}", config.subtraction.clip_sigma))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Dilation"),
        s.value.apply_to(config.subtraction.n_dilation)
    );
    println!();
}
