mod test_failed_pair_leaves_partial_mesh;
mod test_five_members_form_mesh;
mod test_member_shutdown_triggers_disconnect;
mod test_three_members_form_mesh;
