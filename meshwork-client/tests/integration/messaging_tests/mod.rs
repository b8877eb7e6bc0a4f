mod test_broadcast_reaches_connected_peers;
mod test_notification_stream;
