use chrono::NaiveDate;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::args::{Cli, Commands};
use crate::config::StoreConfig;
use crate::coordinator::{bootstrap, TieredCoordinator};
use crate::error::Result;
use crate::models::{StationMetadata, TableSchema, TemperatureReading};
use crate::processors::{IngestReport, Ingestor, IntegrityChecker, IntegrityReport};
use crate::readers::{parse_date, StationReader, TemperatureReader};
use crate::service::{ReplyStatus, StationService};
use crate::storage::{NodeState, ReplicatedMemoryEngine};
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = StoreConfig::load(cli.config.as_deref())?;
    let (engine, coordinator) = start_engine(&config).await?;
    let service = StationService::new(coordinator.clone()).with_deadline(config.request_deadline());

    match cli.command {
        Commands::Schema => {
            let schema = TableSchema::stations(config.replication_factor);
            println!("{};\n", schema.create_keyspace_cql());
            println!("{};\n", schema.create_type_cql());

            let reply = service.station_schema(&service.request_context()).await;
            if reply.status.is_success() {
                println!("{};", reply.schema);
            } else {
                println!("Schema unavailable: {}", reply.error);
            }
        }

        Commands::Ingest {
            stations,
            temperatures,
            state,
            all_states,
            concurrency,
            mmap,
        } => {
            let state = if all_states {
                None
            } else {
                state.or_else(|| config.state_filter.clone())
            };
            println!("Loading stations from {}", stations.display());
            println!("Loading temperatures from {}", temperatures.display());
            if let Some(ref s) = state {
                println!("State filter: {}", s);
            }

            let (station_list, readings) = read_inputs(&stations, &temperatures, state, mmap)?;
            let progress =
                ProgressReporter::new(0, "Ingesting...", !std::io::stderr().is_terminal());

            let ingestor = Ingestor::new(coordinator)
                .with_concurrency(concurrency.unwrap_or(config.ingest_concurrency))
                .with_deadline(config.request_deadline());
            let (report, integrity) = ingestor
                .ingest(station_list, readings, Some(&progress))
                .await?;

            progress.finish_with_message("Ingest complete");
            print_ingest(&report, &integrity);
        }

        Commands::Query {
            stations,
            temperatures,
            station,
            from,
            to,
            down_replicas,
            unresponsive,
            json,
        } => {
            let (station_list, readings) =
                read_inputs(&stations, &temperatures, config.state_filter.clone(), false)?;
            let (report, _) = Ingestor::new(coordinator)
                .with_concurrency(config.ingest_concurrency)
                .with_deadline(config.request_deadline())
                .ingest(station_list, readings, None)
                .await?;
            info!("Preloaded store: {}", report.summary().replace('\n', "; "));

            degrade_replicas(&engine, &station, down_replicas, unresponsive);

            let ctx = service.request_context();
            let name = service.station_name(&station, &ctx).await;
            let max = service.station_max(&station, &ctx).await;

            if json {
                emit_json(&name)?;
                emit_json(&max)?;
            } else {
                println!("Station {}", station);
                if name.found {
                    println!("  Name: {}{}", name.name, status_suffix(name.status, &name.error));
                } else {
                    println!("  Name: -{}", status_suffix(name.status, &name.error));
                }
                if max.found {
                    println!(
                        "  Max temperature: {:.1}°C{}",
                        max.tmax as f32 / 10.0,
                        status_suffix(max.status, &max.error)
                    );
                } else {
                    println!("  Max temperature: -{}", status_suffix(max.status, &max.error));
                }
            }

            if let (Some(from), Some(to)) = (from, to) {
                let (from, to) = (parse_date(&from)?, parse_date(&to)?);
                let records = service.station_records(&station, from, to, &ctx).await;

                if json {
                    emit_json(&records)?;
                } else {
                    print_records(from, to, &records.records);
                    println!("{}", status_suffix(records.status, &records.error).trim());
                }
            }
        }
    }

    Ok(())
}

async fn start_engine(
    config: &StoreConfig,
) -> Result<(Arc<ReplicatedMemoryEngine>, TieredCoordinator)> {
    let engine = Arc::new(ReplicatedMemoryEngine::new(
        config.nodes,
        config.replica_timeout(),
    ));
    let coordinator = bootstrap(engine.clone(), config).await?;
    Ok((engine, coordinator))
}

fn read_inputs(
    stations: &Path,
    temperatures: &Path,
    state: Option<String>,
    mmap: bool,
) -> Result<(Vec<StationMetadata>, Vec<TemperatureReading>)> {
    let mut reader = StationReader::new().with_mmap(mmap);
    if let Some(state) = state {
        reader = reader.with_state_filter(state);
    }

    let station_list = reader.read_stations(stations)?;
    let readings = TemperatureReader::new().read_readings(temperatures)?;
    info!(
        "Read {} stations and {} readings",
        station_list.len(),
        readings.len()
    );
    Ok((station_list, readings))
}

/// Mark the station's replicas, last placement first: `down` of them
/// down, then the next `unresponsive` of them unresponsive.
fn degrade_replicas(
    engine: &ReplicatedMemoryEngine,
    station: &str,
    down: usize,
    unresponsive: usize,
) {
    let replicas = engine.replicas_for(station);
    let states = std::iter::repeat(NodeState::Down)
        .take(down)
        .chain(std::iter::repeat(NodeState::Unresponsive).take(unresponsive));

    for (node, state) in replicas.into_iter().rev().zip(states) {
        info!("Replica node {} of {} -> {:?}", node, station, state);
        engine.set_node_state(node, state);
    }
}

fn status_suffix(status: ReplyStatus, error: &str) -> String {
    match status {
        ReplyStatus::Ok => String::new(),
        ReplyStatus::Degraded => format!(" [degraded: {}]", error),
        ReplyStatus::Failed => format!(" [failed: {}]", error),
    }
}

fn emit_json<T: Serialize>(reply: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(reply)?);
    Ok(())
}

fn print_records(from: NaiveDate, to: NaiveDate, records: &[TemperatureReading]) {
    println!("  Records {} to {} ({}):", from, to, records.len());
    for reading in records {
        println!(
            "    {}  min {:>6.1}°C  max {:>6.1}°C",
            reading.date,
            reading.record.tmin_celsius(),
            reading.record.tmax_celsius()
        );
    }
}

fn print_ingest(report: &IngestReport, integrity: &IntegrityReport) {
    println!("\n{}", IntegrityChecker::new().generate_summary(integrity));
    println!("{}", report.summary());

    if report.readings_unavailable + report.readings_failed == 0 {
        println!("✅ All accepted readings were written");
    } else {
        println!(
            "⚠️  {} readings could not be written",
            report.readings_unavailable + report.readings_failed
        );
    }
}
