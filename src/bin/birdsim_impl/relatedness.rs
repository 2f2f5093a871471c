use super::args::Commands;
use super::utils::open_store;
use birdsim::config::Config;
use birdsim::io::IntoTsv;
use birdsim::relatedness::Points;
use birdsim::utils::{path::from_prefix, Result};
use log::*;

pub fn main_relatedness(args: &Commands, config: &Config) -> Result<()> {
    if let Commands::Relatedness {
        genotype,
        phenotype,
        manifold,
        out_prefix,
    } = args
    {
        let mut store = open_store(config, *manifold, false)?;
        info!("fetch {genotype} and {phenotype} comparisons");
        let points = Points::from_store(&mut store, genotype, phenotype)?;
        store.close()?;

        let related = points.summary(true)?;
        let unrelated = points.summary(false)?;
        println!(
            "Points: {} (related), {} (unrelated)",
            related.count, unrelated.count
        );
        println!("{} vs {}", phenotype, genotype);
        print!("{}", related.show("related"));
        print!("{}", unrelated.show("unrelated"));

        let out = from_prefix(out_prefix, "points.tsv")?;
        points.into_tsv(&out)?;
        info!("points written to {}", out.display());

        #[cfg(feature = "plot")]
        {
            use birdsim::utils::PlotSnafu;
            let svg = plot::scatter_svg(&points, phenotype, genotype).map_err(|e| {
                PlotSnafu {
                    what: "scatterplot",
                    message: e.to_string(),
                }
                .build()
            })?;
            let out = from_prefix(out_prefix, "scatter.svg")?;
            std::fs::write(&out, svg).map_err(|e| {
                PlotSnafu {
                    what: out.display().to_string(),
                    message: e.to_string(),
                }
                .build()
            })?;
            info!("scatterplot written to {}", out.display());
        }
    }
    Ok(())
}

#[cfg(feature = "plot")]
mod plot {
    use birdsim::relatedness::Points;

    /// related pairs in blue over unrelated pairs in gray
    pub fn scatter_svg(
        points: &Points,
        phenotype: &str,
        genotype: &str,
    ) -> Result<String, Box<dyn std::error::Error>> {
        let mut ret = String::new();
        {
            use plotters::prelude::*;
            let root_area = SVGBackend::with_string(&mut ret, (1000, 1000)).into_drawing_area();
            root_area.fill(&WHITE)?;

            let xmax = points
                .points()
                .iter()
                .map(|p| p.phenotype)
                .fold(1.0f64, f64::max);
            let mut cc = ChartBuilder::on(&root_area)
                .margin(40)
                .set_left_and_bottom_label_area_size(60)
                .caption(format!("{phenotype} vs {genotype}"), ("sans-serif", 30))
                .build_cartesian_2d(0.0f64..xmax * 1.05, 0.0f64..100.0f64)?;

            cc.configure_mesh()
                .x_desc(phenotype)
                .y_desc(genotype)
                .axis_desc_style(("sans-serif", 20))
                .draw()?;

            for (related, color, label) in [(false, RGBColor(128, 128, 128), "unrelated"), (true, BLUE, "related")] {
                let n = points.class(related).count();
                cc.draw_series(
                    points
                        .class(related)
                        .map(|p| Circle::new((p.phenotype, p.genotype), 2, color.filled())),
                )?
                .label(format!("{n} {label} pairs"))
                .legend(move |(x, y)| Circle::new((x + 10, y), 3, color.filled()));
            }

            cc.configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .border_style(&BLACK)
                .draw()?;
            root_area.present()?;
        }
        Ok(ret)
    }
}
