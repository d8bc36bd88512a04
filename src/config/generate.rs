pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# CAMLOG CONFIGURATION
# =============================================================================
# Camlog receives camera sighting events over HTTP, coalesces repeated
# sightings of the same name on the same camera into one interval, and
# periodically ships the accumulated batch to remote storage.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/camlog/config.yml
#   3. /etc/camlog/config.yml
#
# Every section is optional. Values written as a dollar sign followed by
# env{NAME} are replaced with the NAME environment variable at load time.

server:
  # Address the POST /log endpoint listens on
  listen: "0.0.0.0:3000"

store:
  # The batch currently being written
  active_path: logs.json
  # Closed batches land here before upload. Files that fail to upload stay
  # here until `camlog flush` succeeds for them.
  closed_dir: old_logs

coalesce:
  # last_write: the most recent event always sets the interval end
  # latest:     the interval end only moves forward in time
  end_policy: last_write

rotation:
  enabled: true
  # Duration: 500ms, 6s, 5m, 1h
  interval: 6s
  # Rotate early once the active batch holds this many records
  # max_records: 10000

upload:
  endpoint: https://node.lighthouse.storage/api/v0/add
  # Falls back to the LIGHTHOUSE_API_KEY environment variable when unset
  # api_key: your-lighthouse-key
  timeout: 60s
"#
    .to_string()
}
